//! Events delivered to the application layer.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::alarm::{now_millis, AlarmId};

/// Number of events retained for polling clients.
const EVENT_LOG_CAPACITY: usize = 256;

// ============================================================================
// AlarmEvent
// ============================================================================

/// An event emitted by the alarm core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AlarmEvent {
    /// A ringing alarm was stopped.
    #[serde(rename_all = "camelCase")]
    Stopped { alarm_id: AlarmId },

    /// A ringing alarm was snoozed and re-armed.
    #[serde(rename_all = "camelCase")]
    Snoozed {
        alarm_id: AlarmId,
        next_fire_time: i64,
        delay_minutes: u32,
    },

    /// The full-screen ringing UI should be shown.
    #[serde(rename_all = "camelCase")]
    OpenAlarmScreen {
        alarm_id: AlarmId,
        label: String,
        audio_ref: String,
    },
}

impl AlarmEvent {
    /// Returns the alarm identity this event refers to.
    #[must_use]
    pub fn alarm_id(&self) -> &AlarmId {
        match self {
            Self::Stopped { alarm_id }
            | Self::Snoozed { alarm_id, .. }
            | Self::OpenAlarmScreen { alarm_id, .. } => alarm_id,
        }
    }

    /// Returns the event name used on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped { .. } => "stopped",
            Self::Snoozed { .. } => "snoozed",
            Self::OpenAlarmScreen { .. } => "openAlarmScreen",
        }
    }
}

/// An event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Monotonically increasing sequence number (starts at 1)
    pub seq: u64,
    /// Emission time in epoch milliseconds
    pub emitted_at: i64,
    /// The event itself
    #[serde(flatten)]
    pub event: AlarmEvent,
}

// ============================================================================
// EventLog
// ============================================================================

/// Bounded log of emitted events.
///
/// Clients poll with the last sequence number they saw; the oldest events
/// are dropped once the log is full.
#[derive(Debug)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    next_seq: u64,
    capacity: usize,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(EVENT_LOG_CAPACITY)),
            next_seq: 1,
            capacity: capacity.max(1),
        }
    }

    /// Appends an event and returns its sequence number.
    pub fn emit(&mut self, event: AlarmEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        tracing::debug!(seq, event = event.name(), alarm_id = %event.alarm_id(), "event emitted");

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(EventRecord {
            seq,
            emitted_at: now_millis(),
            event,
        });
        seq
    }

    /// Returns all retained events with a sequence number greater than `seq`.
    #[must_use]
    pub fn since(&self, seq: u64) -> Vec<EventRecord> {
        self.records
            .iter()
            .filter(|record| record.seq > seq)
            .cloned()
            .collect()
    }

    /// Returns the sequence number of the most recent event (0 if none).
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Returns the most recent event, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&AlarmEvent> {
        self.records.back().map(|record| &record.event)
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
