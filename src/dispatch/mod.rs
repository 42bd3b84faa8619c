//! Fired-alarm and user-action dispatch.
//!
//! Native action names (notification buttons, dismiss callbacks, IPC
//! commands) are decoded exactly once, here, into the closed
//! [`AlarmAction`] type; everything downstream matches on the enum.

mod action;
mod fired;

use serde::{Deserialize, Serialize};

pub use action::{ActionDispatcher, ActionOutcome};
pub use fired::{FiredAlarmDispatcher, FiredState};

use crate::notification::action_ids;
use crate::scheduler::SchedulingGateway;
use crate::screen::AlarmScreen;
use crate::session::RingingSessionManager;
use crate::types::{AlarmEvent, AlarmId, EventLog};

/// Extra fields delivered alongside a native action name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExtras {
    #[serde(default)]
    pub alarm_id: Option<String>,
    #[serde(default)]
    pub audio_ref: Option<String>,
}

impl ActionExtras {
    pub fn new(alarm_id: Option<&str>, audio_ref: Option<&str>) -> Self {
        Self {
            alarm_id: alarm_id.map(String::from),
            audio_ref: audio_ref.map(String::from),
        }
    }
}

/// A user action on a ringing alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmAction {
    /// Stop ringing and reset the snooze sequence.
    Stop { alarm_id: AlarmId },
    /// Stop ringing and re-arm after the next snooze delay.
    Snooze { alarm_id: AlarmId, audio_ref: String },
    /// The notification was removed by the system; reassert it.
    DismissAttempt { alarm_id: AlarmId, audio_ref: String },
    /// Repost the notification only.
    Renotify,
    /// The notification body was tapped.
    OpenScreen { alarm_id: AlarmId },
}

impl AlarmAction {
    /// Decodes a native action name.
    ///
    /// A missing or empty alarm id decodes to `"default"`. Returns `None`
    /// for names that are not alarm actions.
    pub fn decode(action: &str, extras: &ActionExtras) -> Option<Self> {
        let alarm_id = AlarmId::from_optional(extras.alarm_id.as_deref());
        let audio_ref = extras.audio_ref.clone().unwrap_or_default();

        let decoded = match action {
            "STOP" | "STOP_ALARM" | action_ids::STOP => Self::Stop { alarm_id },
            "SNOOZE" | "SNOOZE_ALARM" | action_ids::SNOOZE => Self::Snooze {
                alarm_id,
                audio_ref,
            },
            "ALARM_NOTIFICATION_DISMISSED" | action_ids::DISMISS => Self::DismissAttempt {
                alarm_id,
                audio_ref,
            },
            "RENOTIFY" => Self::Renotify,
            "OPEN_ALARM_SCREEN" | action_ids::DEFAULT => Self::OpenScreen { alarm_id },
            _ => return None,
        };
        Some(decoded)
    }

    /// Encodes the action as a native name plus extras, the inverse of
    /// [`AlarmAction::decode`].
    #[must_use]
    pub fn encode(&self) -> (&'static str, ActionExtras) {
        match self {
            Self::Stop { alarm_id } => ("STOP", ActionExtras::new(Some(alarm_id.as_str()), None)),
            Self::Snooze {
                alarm_id,
                audio_ref,
            } => (
                "SNOOZE",
                ActionExtras::new(Some(alarm_id.as_str()), Some(audio_ref)),
            ),
            Self::DismissAttempt {
                alarm_id,
                audio_ref,
            } => (
                "ALARM_NOTIFICATION_DISMISSED",
                ActionExtras::new(Some(alarm_id.as_str()), Some(audio_ref)),
            ),
            Self::Renotify => ("RENOTIFY", ActionExtras::default()),
            Self::OpenScreen { alarm_id } => (
                "OPEN_ALARM_SCREEN",
                ActionExtras::new(Some(alarm_id.as_str()), None),
            ),
        }
    }

    /// Returns the action name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stop { .. } => "stop",
            Self::Snooze { .. } => "snooze",
            Self::DismissAttempt { .. } => "dismiss_attempt",
            Self::Renotify => "renotify",
            Self::OpenScreen { .. } => "open_screen",
        }
    }
}

/// Collaborators a dispatcher works on.
///
/// Borrowed from the daemon core for the duration of one dispatch, so
/// every action runs to completion before the next one starts.
pub struct AlarmContext<'a> {
    pub session: &'a mut RingingSessionManager,
    pub gateway: &'a SchedulingGateway,
    pub screen: &'a dyn AlarmScreen,
    pub events: &'a mut EventLog,
}

impl AlarmContext<'_> {
    /// Shows the alarm screen and tells clients to open theirs.
    pub(crate) fn open_screen(&mut self, alarm_id: &AlarmId, label: &str, audio_ref: &str) {
        let request = crate::screen::ScreenRequest {
            alarm_id: alarm_id.clone(),
            label: label.to_string(),
            audio_ref: audio_ref.to_string(),
        };
        self.screen.show(&request);
        self.events.emit(AlarmEvent::OpenAlarmScreen {
            alarm_id: request.alarm_id,
            label: request.label,
            audio_ref: request.audio_ref,
        });
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn extras(id: &str, audio: &str) -> ActionExtras {
        ActionExtras::new(Some(id), Some(audio))
    }

    #[test]
    fn test_decode_stop_names() {
        for name in ["STOP", "STOP_ALARM", "STOP_ACTION"] {
            assert_eq!(
                AlarmAction::decode(name, &extras("a1", "")),
                Some(AlarmAction::Stop {
                    alarm_id: AlarmId::new("a1")
                })
            );
        }
    }

    #[test]
    fn test_decode_snooze_carries_audio() {
        for name in ["SNOOZE", "SNOOZE_ALARM", "SNOOZE_ACTION"] {
            assert_eq!(
                AlarmAction::decode(name, &extras("a1", "song.mp3")),
                Some(AlarmAction::Snooze {
                    alarm_id: AlarmId::new("a1"),
                    audio_ref: "song.mp3".to_string()
                })
            );
        }
    }

    #[test]
    fn test_decode_dismiss_and_renotify() {
        assert!(matches!(
            AlarmAction::decode("ALARM_NOTIFICATION_DISMISSED", &extras("a1", "")),
            Some(AlarmAction::DismissAttempt { .. })
        ));
        assert!(matches!(
            AlarmAction::decode(action_ids::DISMISS, &extras("a1", "")),
            Some(AlarmAction::DismissAttempt { .. })
        ));
        assert_eq!(
            AlarmAction::decode("RENOTIFY", &ActionExtras::default()),
            Some(AlarmAction::Renotify)
        );
    }

    #[test]
    fn test_decode_tap() {
        assert_eq!(
            AlarmAction::decode(action_ids::DEFAULT, &extras("a1", "")),
            Some(AlarmAction::OpenScreen {
                alarm_id: AlarmId::new("a1")
            })
        );
    }

    #[test]
    fn test_missing_id_decodes_to_default() {
        assert_eq!(
            AlarmAction::decode("STOP", &ActionExtras::default()),
            Some(AlarmAction::Stop {
                alarm_id: AlarmId::new("default")
            })
        );
        assert_eq!(
            AlarmAction::decode("STOP", &extras("", "")),
            Some(AlarmAction::Stop {
                alarm_id: AlarmId::new("default")
            })
        );
    }

    #[test]
    fn test_unknown_action() {
        assert!(AlarmAction::decode("PAUSE", &ActionExtras::default()).is_none());
        assert!(AlarmAction::decode("", &ActionExtras::default()).is_none());
    }

    #[test]
    fn test_encode_decodes_back() {
        let actions = [
            AlarmAction::Stop {
                alarm_id: AlarmId::new("a1"),
            },
            AlarmAction::Snooze {
                alarm_id: AlarmId::new("a1_snooze_5"),
                audio_ref: "song.mp3".to_string(),
            },
            AlarmAction::Renotify,
            AlarmAction::OpenScreen {
                alarm_id: AlarmId::new("a1"),
            },
        ];
        for action in actions {
            let (name, extras) = action.encode();
            assert_eq!(AlarmAction::decode(name, &extras), Some(action));
        }
    }

    #[test]
    fn test_extras_deserialize_camel_case() {
        let extras: ActionExtras =
            serde_json::from_str(r#"{"alarmId":"a1","audioRef":"x.mp3"}"#).unwrap();
        assert_eq!(extras, ActionExtras::new(Some("a1"), Some("x.mp3")));

        let extras: ActionExtras = serde_json::from_str("{}").unwrap();
        assert_eq!(extras, ActionExtras::default());
    }
}
