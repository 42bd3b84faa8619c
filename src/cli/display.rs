//! Display utilities for the wakeup CLI.
//!
//! This module provides formatted output for:
//! - Command results (schedule, cancel, stop, snooze)
//! - Status and permission reports
//! - The ringing alarm screen rendered by `wakeup watch`

use crate::screen::RingingScreenControls;
use crate::types::{now_millis, AlarmEvent, EventRecord, IpcResponse, PermissionStatus};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a schedule command.
    pub fn show_schedule(response: &IpcResponse) {
        if response.is_permission_denied() {
            println!("! {}", response.message);
        } else {
            println!("* アラームを登録しました");
        }

        if let Some(data) = &response.data {
            if let Some(alarm_id) = &data.alarm_id {
                println!("  ID: {}", alarm_id);
            }
            if let Some(fire_at) = data.fire_at_ms {
                println!("  鳴動: {}", Self::format_until(fire_at, now_millis()));
            }
            if let Some(schedule) = &data.schedule {
                println!("  種別: {}", Self::schedule_label(schedule));
            }
        }
    }

    /// Shows the result of a cancel or cancel-all command.
    pub fn show_cancel(response: &IpcResponse) {
        println!("[] {}", response.message);
    }

    /// Shows the result of a ring command.
    pub fn show_ring(response: &IpcResponse) {
        println!("♪ {}", response.message);
        if let Some(session) = response.data.as_ref().and_then(|d| d.session.as_ref()) {
            println!("  ID: {}", session.alarm_id);
        }
    }

    /// Shows the result of a stop or snooze command.
    pub fn show_action(response: &IpcResponse) {
        println!("* {}", response.message);

        if let Some(data) = &response.data {
            if let Some(snooze_id) = &data.snooze_id {
                println!("  スヌーズID: {}", snooze_id);
            }
            if let Some(next) = data.next_fire_time {
                println!("  次回: {}", Self::format_until(next, now_millis()));
            }
        }
    }

    /// Shows the ringing session and pending alarms.
    pub fn show_status(response: &IpcResponse) {
        println!("wakeup ステータス");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("Daemonから情報を取得できませんでした");
            return;
        };

        match &data.session {
            Some(session) => {
                let title = if session.label.is_empty() {
                    "アラーム"
                } else {
                    session.label.as_str()
                };
                println!("鳴動中: {} ({})", title, session.alarm_id);
                println!("  音声: {}", Self::audio_state_label(&session.audio_state));
                println!(
                    "  バイブ: {}  スリープ抑止: {}",
                    Self::on_off(session.vibrating),
                    Self::on_off(session.wake_lock_held)
                );
            }
            None => println!("鳴動中のアラームはありません"),
        }

        let pending = data.pending.as_deref().unwrap_or_default();
        if pending.is_empty() {
            println!("予約: なし");
        } else {
            println!("予約: {}件", pending.len());
            let now = now_millis();
            for registration in pending {
                let payload = &registration.payload;
                print!(
                    "  {}  {}",
                    payload.alarm_id,
                    Self::format_until(registration.fire_at_ms, now)
                );
                if !payload.label.is_empty() {
                    print!("  {}", payload.label);
                }
                if !registration.exact {
                    print!("  (通常)");
                }
                println!();
            }
        }
    }

    /// Shows the permission report.
    pub fn show_permissions(response: &IpcResponse) {
        let Some(permissions) = response.data.as_ref().and_then(|d| d.permissions.as_ref()) else {
            println!("権限情報を取得できませんでした");
            return;
        };

        for line in Self::permission_lines(permissions) {
            println!("{}", line);
        }
    }

    /// Shows the result of a settings command.
    pub fn show_settings(response: &IpcResponse) {
        println!("* {}", response.message);
    }

    /// Shows a single event line.
    pub fn show_event(record: &EventRecord) {
        println!("{}", Self::event_line(record));
    }

    /// Shows the ringing alarm screen.
    pub fn show_alarm_screen(controls: &RingingScreenControls) {
        println!("{}", Self::render_alarm_screen(controls));
    }

    /// Shows a success message for LaunchAgent installation.
    pub fn show_install_success() {
        println!("* LaunchAgentをインストールしました");
        println!("  次回ログイン時から自動的に起動します");
    }

    /// Shows a success message for LaunchAgent uninstallation.
    pub fn show_uninstall_success() {
        println!("* LaunchAgentをアンインストールしました");
        println!("  次回ログイン時から自動起動しなくなります");
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// Formats a fire time relative to `now`.
    fn format_until(target_ms: i64, now_ms: i64) -> String {
        let remaining_secs = (target_ms - now_ms).max(0) / 1000;
        if remaining_secs == 0 {
            return "まもなく".to_string();
        }
        let hours = remaining_secs / 3600;
        let minutes = (remaining_secs % 3600) / 60;
        let seconds = remaining_secs % 60;
        if hours > 0 {
            format!("{}時間{}分後", hours, minutes)
        } else if minutes > 0 {
            format!("{}分{:02}秒後", minutes, seconds)
        } else {
            format!("{}秒後", seconds)
        }
    }

    fn schedule_label(schedule: &str) -> &str {
        match schedule {
            "exact" => "正確なタイマー",
            "inexact" => "通常のタイマー",
            other => other,
        }
    }

    fn audio_state_label(state: &str) -> &str {
        match state {
            "preparing" => "準備中",
            "playing" => "再生中",
            "recovering" => "復旧中",
            "failed" => "再生失敗",
            "idle" => "停止",
            other => other,
        }
    }

    fn on_off(value: bool) -> &'static str {
        if value {
            "ON"
        } else {
            "OFF"
        }
    }

    fn mark(granted: bool) -> &'static str {
        if granted {
            "OK"
        } else {
            "NG"
        }
    }

    fn permission_lines(permissions: &PermissionStatus) -> Vec<String> {
        let mut lines = vec![
            format!(
                "[{}] 正確なタイマー",
                Self::mark(permissions.can_schedule_exact_timers)
            ),
            format!(
                "[{}] スリープ抑止 (バッテリー最適化の除外)",
                Self::mark(permissions.battery_unrestricted)
            ),
            format!("[{}] 通知", Self::mark(permissions.notifications_enabled)),
        ];

        if !permissions.all_granted {
            lines.push(String::new());
            lines.push(permissions.oem_instructions.clone());
        }
        lines
    }

    fn event_line(record: &EventRecord) -> String {
        match &record.event {
            AlarmEvent::Stopped { alarm_id } => {
                format!("#{} 停止: {}", record.seq, alarm_id)
            }
            AlarmEvent::Snoozed {
                alarm_id,
                delay_minutes,
                ..
            } => format!("#{} スヌーズ: {} ({}分後)", record.seq, alarm_id, delay_minutes),
            AlarmEvent::OpenAlarmScreen { alarm_id, .. } => {
                format!("#{} 鳴動: {}", record.seq, alarm_id)
            }
        }
    }

    fn render_alarm_screen(controls: &RingingScreenControls) -> String {
        let title = controls.title();
        let width = title.chars().count().max(20) + 4;
        let rule = "═".repeat(width);
        format!(
            "{rule}\n  ⏰ {title}\n{rule}\n  [s] 停止    [z] スヌーズ",
            rule = rule,
            title = title
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
