//! wakeup library
//!
//! Core of an alarm clock: alarms are registered with an exact timer,
//! ring with a looping sound, vibration and a persistent notification, and
//! are stopped or snoozed from the notification or the full-screen UI.
//! It includes:
//! - Escalating snooze policy and alarm identity handling
//! - Scheduling gateway with a durable index of pending alarms
//! - Ringing session manager (audio, vibration, wake lock, notification)
//! - Fired-alarm and action dispatchers
//! - IPC server/client for daemon-CLI communication
//! - Native macOS notifications (macOS only)
//! - LaunchAgent management for auto-start at login (macOS only)

pub mod cli;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod launchagent;
pub mod notification;
pub mod platform;
pub mod scheduler;
pub mod screen;
pub mod session;
pub mod snooze;
pub mod sound;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use config::AlarmConfig;
pub use daemon::{run_daemon, AlarmCore, CoreError};
pub use dispatch::{ActionDispatcher, ActionOutcome, AlarmAction, FiredAlarmDispatcher};
pub use scheduler::{ScheduleOutcome, SchedulingGateway, TimerService, TokioTimerService};
pub use session::RingingSessionManager;
pub use snooze::SnoozePolicy;
pub use types::{
    AlarmEvent, AlarmId, AlarmPayload, IpcRequest, IpcResponse, PermissionStatus, ResponseData,
};
