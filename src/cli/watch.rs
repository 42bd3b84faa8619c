//! `wakeup watch`: follows the daemon's event log and renders the ringing
//! screen.
//!
//! While the screen is up, `s` + Enter stops the alarm and `z` + Enter
//! snoozes it. Both go through the same action path as the notification
//! buttons.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::client::IpcClient;
use super::display::Display;
use crate::screen::{RingingScreenControls, ScreenRequest};
use crate::types::{AlarmEvent, EventRecord};

/// Event poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Screen command read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScreenCommand {
    Stop,
    Snooze,
}

fn parse_screen_command(line: &str) -> Option<ScreenCommand> {
    match line.trim().to_lowercase().as_str() {
        "s" | "stop" => Some(ScreenCommand::Stop),
        "z" | "snooze" => Some(ScreenCommand::Snooze),
        _ => None,
    }
}

/// Applies an event to the screen currently shown.
///
/// `openAlarmScreen` raises the screen; `stopped`/`snoozed` for the same
/// alarm take it down.
fn apply_event(
    current: Option<RingingScreenControls>,
    event: &AlarmEvent,
) -> Option<RingingScreenControls> {
    match event {
        AlarmEvent::OpenAlarmScreen {
            alarm_id,
            label,
            audio_ref,
        } => Some(RingingScreenControls::new(ScreenRequest {
            alarm_id: alarm_id.clone(),
            label: label.clone(),
            audio_ref: audio_ref.clone(),
        })),
        AlarmEvent::Stopped { alarm_id } | AlarmEvent::Snoozed { alarm_id, .. } => {
            current.filter(|controls| &controls.request().alarm_id != alarm_id)
        }
    }
}

/// Follows events until stdin closes or the process is interrupted.
///
/// # Errors
///
/// Returns an error if the daemon cannot be reached.
pub async fn run_watch(client: &IpcClient, since: u64) -> Result<()> {
    let mut last_seq = since;
    let mut screen: Option<RingingScreenControls> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut interval = tokio::time::interval(POLL_INTERVAL);

    println!("イベントを待っています (Ctrl+C で終了)");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let response = client.events(last_seq).await?;
                let Some(data) = response.data else { continue };
                let records: Vec<EventRecord> = data.events.unwrap_or_default();
                for record in &records {
                    Display::show_event(record);
                    let was_showing = screen.is_some();
                    screen = apply_event(screen.take(), &record.event);
                    if let (AlarmEvent::OpenAlarmScreen { .. }, Some(controls)) = (&record.event, &screen) {
                        Display::show_alarm_screen(controls);
                    } else if was_showing && screen.is_none() {
                        println!("アラーム画面を閉じました");
                    }
                }
                last_seq = data.last_seq.unwrap_or(last_seq).max(last_seq);
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => {
                        stdin_open = false;
                        continue;
                    }
                };
                let Some(controls) = &screen else { continue };
                let action = match parse_screen_command(&line) {
                    Some(ScreenCommand::Stop) => controls.stop(),
                    Some(ScreenCommand::Snooze) => controls.snooze(),
                    None => continue,
                };
                match client.action(&action).await {
                    Ok(response) => Display::show_action(&response),
                    Err(e) => Display::show_error(&e.to_string()),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::AlarmAction;
    use crate::types::AlarmId;

    fn open(id: &str) -> AlarmEvent {
        AlarmEvent::OpenAlarmScreen {
            alarm_id: AlarmId::new(id),
            label: "起床".to_string(),
            audio_ref: "song.mp3".to_string(),
        }
    }

    #[test]
    fn test_parse_screen_command() {
        assert_eq!(parse_screen_command("s"), Some(ScreenCommand::Stop));
        assert_eq!(parse_screen_command(" Z \n"), Some(ScreenCommand::Snooze));
        assert_eq!(parse_screen_command("snooze"), Some(ScreenCommand::Snooze));
        assert_eq!(parse_screen_command("q"), None);
    }

    #[test]
    fn test_open_event_raises_screen() {
        let screen = apply_event(None, &open("a1")).unwrap();
        assert_eq!(screen.title(), "起床");
        assert_eq!(
            screen.snooze(),
            AlarmAction::Snooze {
                alarm_id: AlarmId::new("a1"),
                audio_ref: "song.mp3".to_string(),
            }
        );
    }

    #[test]
    fn test_stopped_event_closes_matching_screen() {
        let screen = apply_event(None, &open("a1"));
        let closed = apply_event(
            screen,
            &AlarmEvent::Stopped {
                alarm_id: AlarmId::new("a1"),
            },
        );
        assert!(closed.is_none());
    }

    #[test]
    fn test_event_for_other_alarm_keeps_screen() {
        let screen = apply_event(None, &open("a2"));
        let kept = apply_event(
            screen,
            &AlarmEvent::Snoozed {
                alarm_id: AlarmId::new("a1"),
                next_fire_time: 0,
                delay_minutes: 5,
            },
        );
        assert!(kept.is_some());
    }
}
