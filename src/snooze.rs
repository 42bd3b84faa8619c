//! Escalating snooze-delay policy.
//!
//! Each base alarm has a counter of consecutive snoozes. The n-th snooze
//! waits `sequence[min(n, len - 1)]` minutes, so the delay follows the
//! sequence and then stays on its last stage. Stopping an alarm resets the
//! counter.

use std::sync::Arc;

use serde_json::Value;

use crate::store::KeyValueStore;
use crate::types::AlarmId;

/// Key prefix of persisted snooze counters.
pub const SNOOZE_COUNT_PREFIX: &str = "snooze_count_";

/// Default delay sequence in minutes.
pub const DEFAULT_SNOOZE_SEQUENCE: [u32; 15] = [5, 5, 5, 10, 3, 3, 3, 4, 4, 4, 2, 3, 4, 5, 6];

/// Returns the store key of the counter for `id`'s base alarm.
#[must_use]
pub fn counter_key(id: &AlarmId) -> String {
    format!("{}{}", SNOOZE_COUNT_PREFIX, id.base())
}

/// Snooze delay policy backed by a durable store.
pub struct SnoozePolicy {
    store: Arc<dyn KeyValueStore>,
    sequence: Vec<u32>,
}

impl SnoozePolicy {
    /// Creates a policy with the default sequence.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_sequence(store, DEFAULT_SNOOZE_SEQUENCE.to_vec())
    }

    /// Creates a policy with a custom sequence.
    ///
    /// An empty sequence falls back to the default one.
    pub fn with_sequence(store: Arc<dyn KeyValueStore>, sequence: Vec<u32>) -> Self {
        let sequence = if sequence.is_empty() {
            DEFAULT_SNOOZE_SEQUENCE.to_vec()
        } else {
            sequence
        };
        Self { store, sequence }
    }

    /// Returns the delay sequence in minutes.
    #[must_use]
    pub fn sequence(&self) -> &[u32] {
        &self.sequence
    }

    /// Returns the current consecutive snooze count of `id`'s base alarm.
    ///
    /// Unreadable or malformed counters count as zero.
    #[must_use]
    pub fn count(&self, id: &AlarmId) -> u32 {
        match self.store.get(&counter_key(id)) {
            Ok(Some(value)) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(alarm_id = %id, "スヌーズ回数を読み込めません: {}", e);
                0
            }
        }
    }

    /// Returns the delay for the next snooze and records it.
    ///
    /// The incremented count is persisted before this returns. A failed
    /// write is logged; the delay is still returned so the alarm is re-armed.
    pub fn next_delay(&self, id: &AlarmId) -> u32 {
        let count = self.count(id);
        let index = (count as usize).min(self.sequence.len() - 1);
        let delay = self.sequence[index];

        if let Err(e) = self
            .store
            .put(&counter_key(id), Value::from(count.saturating_add(1)))
        {
            tracing::warn!(alarm_id = %id, "スヌーズ回数を保存できません: {}", e);
        }

        tracing::debug!(alarm_id = %id.base(), count, delay, "snooze delay computed");
        delay
    }

    /// Deletes the counter for `id`'s base alarm.
    pub fn reset(&self, id: &AlarmId) {
        if let Err(e) = self.store.remove(&counter_key(id)) {
            tracing::warn!(alarm_id = %id, "スヌーズ回数をリセットできません: {}", e);
        }
    }
}

impl std::fmt::Debug for SnoozePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnoozePolicy")
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
