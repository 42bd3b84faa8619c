//! IPC request/response types.
//!
//! One JSON request per connection, tagged by `command`:
//!
//! ```text
//! {"command":"schedule","alarmId":"a1","fireAtMs":1718000000000,"audioRef":"","label":"Wake"}
//! {"command":"cancel-all"}
//! ```

use serde::{Deserialize, Serialize};

use super::alarm::AlarmId;
use super::event::EventRecord;
use crate::platform::SettingsSurface;
use crate::scheduler::PendingRegistration;

// ============================================================================
// Requests
// ============================================================================

/// Parameters for the schedule command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleParams {
    /// Alarm identity (empty becomes `"default"`)
    #[serde(default)]
    pub alarm_id: String,
    /// Fire time in epoch milliseconds
    pub fire_at_ms: i64,
    /// Audio reference (empty for the bundled tone)
    #[serde(default)]
    pub audio_ref: String,
    /// Label shown while ringing
    #[serde(default)]
    pub label: String,
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum IpcRequest {
    /// Register an alarm
    Schedule {
        #[serde(flatten)]
        params: ScheduleParams,
    },
    /// Cancel one alarm
    #[serde(rename_all = "camelCase")]
    Cancel { alarm_id: String },
    /// Cancel every alarm the daemon knows about
    CancelAll,
    /// Start ringing immediately
    #[serde(rename_all = "camelCase")]
    Ring {
        #[serde(default)]
        alarm_id: String,
        #[serde(default)]
        audio_ref: String,
        #[serde(default)]
        label: String,
    },
    /// Stop the ringing alarm
    Stop,
    /// Snooze the ringing alarm
    Snooze,
    /// Query session, dispatcher and pending alarms
    Status,
    /// Query permissions
    Permissions,
    /// Open a settings surface
    OpenSettings { surface: SettingsSurface },
    /// Poll events newer than `since`
    Events {
        #[serde(default)]
        since: u64,
    },
    /// Deliver a raw action name (notification button, screen control)
    #[serde(rename_all = "camelCase")]
    Action {
        action: String,
        #[serde(default)]
        alarm_id: Option<String>,
        #[serde(default)]
        audio_ref: Option<String>,
    },
}

impl IpcRequest {
    /// Returns the command name for logs.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Schedule { .. } => "schedule",
            Self::Cancel { .. } => "cancel",
            Self::CancelAll => "cancel-all",
            Self::Ring { .. } => "ring",
            Self::Stop => "stop",
            Self::Snooze => "snooze",
            Self::Status => "status",
            Self::Permissions => "permissions",
            Self::OpenSettings { .. } => "open-settings",
            Self::Events { .. } => "events",
            Self::Action { .. } => "action",
        }
    }
}

// ============================================================================
// Response payloads
// ============================================================================

/// Snapshot of the ringing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub alarm_id: AlarmId,
    pub label: String,
    pub audio_ref: String,
    /// Resolved audio source actually used
    pub source: String,
    /// Audio sub-state (`preparing`, `playing`, ...)
    pub audio_state: String,
    pub vibrating: bool,
    pub wake_lock_held: bool,
    /// Start time in epoch milliseconds
    pub started_at: i64,
}

/// Capabilities that affect alarm reliability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub can_schedule_exact_timers: bool,
    pub battery_unrestricted: bool,
    pub notifications_enabled: bool,
    pub all_granted: bool,
    /// Manufacturer-specific power-management instructions
    pub oem_instructions: String,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_id: Option<AlarmId>,
    /// Registration kind (`exact` or `inexact`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_at_ms: Option<i64>,
    /// Number of alarms cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<usize>,
    /// Whether an alarm was ringing when the command arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_ringing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze_id: Option<AlarmId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_fire_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionStatus>,
    /// Fired-alarm dispatcher state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatcher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<Vec<PendingRegistration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EventRecord>>,
    /// Highest event sequence number emitted so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<u64>,
}

// ============================================================================
// IpcResponse
// ============================================================================

/// Response status for a request that succeeded.
pub const STATUS_SUCCESS: &str = "success";

/// Response status for a request refused for lack of permission.
pub const STATUS_PERMISSION_DENIED: &str = "permission_denied";

/// Response status for a failed request.
pub const STATUS_ERROR: &str = "error";

/// IPC response from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status (`success`, `permission_denied` or `error`)
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates a permission-denied response.
    ///
    /// Data is kept so that a degraded result (an inexact timer) still
    /// reaches the caller.
    pub fn permission_denied(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: STATUS_PERMISSION_DENIED.to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.status == STATUS_PERMISSION_DENIED
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // IpcRequest Tests
    // ------------------------------------------------------------------------

    mod ipc_request_tests {
        use super::*;

        #[test]
        fn test_schedule_serialize() {
            let request = IpcRequest::Schedule {
                params: ScheduleParams {
                    alarm_id: "a1".to_string(),
                    fire_at_ms: 1_000,
                    audio_ref: "song.mp3".to_string(),
                    label: "Wake".to_string(),
                },
            };

            let json = serde_json::to_string(&request).unwrap();
            assert!(json.contains("\"command\":\"schedule\""));
            assert!(json.contains("\"alarmId\":\"a1\""));
            assert!(json.contains("\"fireAtMs\":1000"));
            assert!(json.contains("\"audioRef\":\"song.mp3\""));
        }

        #[test]
        fn test_schedule_deserialize_defaults() {
            let json = r#"{"command":"schedule","fireAtMs":5}"#;
            let request: IpcRequest = serde_json::from_str(json).unwrap();

            match request {
                IpcRequest::Schedule { params } => {
                    assert_eq!(params.fire_at_ms, 5);
                    assert!(params.alarm_id.is_empty());
                    assert!(params.label.is_empty());
                }
                _ => panic!("Expected Schedule request"),
            }
        }

        #[test]
        fn test_unit_commands() {
            assert_eq!(
                serde_json::to_string(&IpcRequest::CancelAll).unwrap(),
                r#"{"command":"cancel-all"}"#
            );
            let request: IpcRequest = serde_json::from_str(r#"{"command":"stop"}"#).unwrap();
            assert_eq!(request, IpcRequest::Stop);
        }

        #[test]
        fn test_cancel_camel_case() {
            let request: IpcRequest =
                serde_json::from_str(r#"{"command":"cancel","alarmId":"a1"}"#).unwrap();
            assert_eq!(
                request,
                IpcRequest::Cancel {
                    alarm_id: "a1".to_string()
                }
            );
        }

        #[test]
        fn test_open_settings() {
            let request: IpcRequest =
                serde_json::from_str(r#"{"command":"open-settings","surface":"exact-timer"}"#)
                    .unwrap();
            assert_eq!(
                request,
                IpcRequest::OpenSettings {
                    surface: SettingsSurface::ExactTimer
                }
            );
        }

        #[test]
        fn test_action_optional_extras() {
            let request: IpcRequest =
                serde_json::from_str(r#"{"command":"action","action":"STOP"}"#).unwrap();
            assert_eq!(
                request,
                IpcRequest::Action {
                    action: "STOP".to_string(),
                    alarm_id: None,
                    audio_ref: None,
                }
            );
        }

        #[test]
        fn test_events_default_since() {
            let request: IpcRequest = serde_json::from_str(r#"{"command":"events"}"#).unwrap();
            assert_eq!(request, IpcRequest::Events { since: 0 });
        }

        #[test]
        fn test_unknown_command() {
            assert!(serde_json::from_str::<IpcRequest>(r#"{"command":"pause"}"#).is_err());
        }

        #[test]
        fn test_command_names() {
            assert_eq!(IpcRequest::CancelAll.command(), "cancel-all");
            assert_eq!(IpcRequest::Events { since: 0 }.command(), "events");
        }
    }

    // ------------------------------------------------------------------------
    // IpcResponse Tests
    // ------------------------------------------------------------------------

    mod ipc_response_tests {
        use super::*;

        #[test]
        fn test_success_response() {
            let response = IpcResponse::success("ok", None);
            assert!(response.is_success());
            assert_eq!(
                serde_json::to_string(&response).unwrap(),
                r#"{"status":"success","message":"ok"}"#
            );
        }

        #[test]
        fn test_permission_denied_keeps_data() {
            let data = ResponseData {
                schedule: Some("inexact".to_string()),
                ..Default::default()
            };
            let response = IpcResponse::permission_denied("denied", Some(data));
            assert!(response.is_permission_denied());
            assert!(!response.is_success());
            assert_eq!(
                response.data.unwrap().schedule.as_deref(),
                Some("inexact")
            );
        }

        #[test]
        fn test_error_response() {
            let response = IpcResponse::error("failed");
            assert_eq!(response.status, "error");
            assert!(response.data.is_none());
        }

        #[test]
        fn test_response_data_camel_case() {
            let data = ResponseData {
                alarm_id: Some(AlarmId::new("a1")),
                next_fire_time: Some(42),
                delay_minutes: Some(5),
                ..Default::default()
            };
            let json = serde_json::to_string(&data).unwrap();
            assert_eq!(
                json,
                r#"{"alarmId":"a1","nextFireTime":42,"delayMinutes":5}"#
            );
        }

        #[test]
        fn test_permissions_serialize() {
            let status = PermissionStatus {
                can_schedule_exact_timers: true,
                battery_unrestricted: false,
                notifications_enabled: true,
                all_granted: false,
                oem_instructions: String::new(),
            };
            let json = serde_json::to_string(&status).unwrap();
            assert!(json.contains("\"canScheduleExactTimers\":true"));
            assert!(json.contains("\"allGranted\":false"));
        }
    }
}
