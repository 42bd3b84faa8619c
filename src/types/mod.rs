//! Core data types for the alarm daemon.
//!
//! This module defines the data structures used for:
//! - Alarm identity and timer payloads
//! - Events delivered to the application layer
//! - IPC request/response serialization

mod alarm;
mod event;
mod ipc;

pub use alarm::{
    now_millis, AlarmId, AlarmPayload, DEFAULT_AUDIO_REF, SNOOZED_ALARM_LABEL, SNOOZE_DELIMITER,
};
pub use event::{AlarmEvent, EventLog, EventRecord};
pub use ipc::{
    IpcRequest, IpcResponse, PermissionStatus, ResponseData, ScheduleParams, SessionStatus,
    STATUS_ERROR, STATUS_PERMISSION_DENIED, STATUS_SUCCESS,
};
