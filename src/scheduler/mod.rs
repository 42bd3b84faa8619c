//! Scheduling gateway.
//!
//! Translates `(alarm id, fire time, payload)` into timer registrations:
//!
//! - the callback token is the 31-multiplier string hash of the identity, so
//!   schedule and cancel always agree on the token for the same identity
//! - scheduling replaces any earlier registration of the same identity
//! - when exact timers are refused the alarm is still registered as an
//!   inexact timer, and the caller is told permission was denied
//! - every registration is mirrored in the durable store under
//!   `pending_<id>` so it can be restored after a restart and cancelled
//!   exactly by [`SchedulingGateway::cancel_all`]
//!
//! ```text
//! schedule(id) ──▶ token = hash(id) ──▶ cancel(token) ──▶ set_exact
//!                                                          │ denied / failed
//!                                                          ▼
//!                                                      set_inexact
//! ```

mod error;
mod timer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use error::SchedulerError;
pub use timer::{
    FiredAlarm, MockRegistration, MockTimerService, TimerService, TokioTimerService,
};

use crate::store::KeyValueStore;
use crate::types::{AlarmId, AlarmPayload};

/// Key prefix of persisted pending registrations.
pub const PENDING_PREFIX: &str = "pending_";

/// Identity prefixes covered by the cleanup sweep.
const SWEEP_PREFIXES: [&str; 4] = ["alarm-", "test-", "snooze-", ""];

/// Raw tokens `0..SWEEP_RAW_TOKENS` covered by the cleanup sweep.
const SWEEP_RAW_TOKENS: i32 = 1000;

/// Numeric suffixes `0..SWEEP_SUFFIXES` combined with each sweep prefix.
const SWEEP_SUFFIXES: u32 = 100;

/// Derives the 32-bit callback token of an identity.
///
/// Uses the classic `h = 31 * h + c` string hash over UTF-16 code units
/// with wrapping arithmetic, so tokens match the ones the native layer
/// derives for the same identity.
#[must_use]
pub fn callback_token(id: &str) -> i32 {
    id.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// How a schedule request was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Registered as an exact, idle-tolerant timer.
    Exact,
    /// Registered as a best-effort timer.
    Inexact {
        /// True when the exact timer was refused for lack of permission.
        permission_denied: bool,
    },
}

impl ScheduleOutcome {
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }

    #[must_use]
    pub fn permission_denied(&self) -> bool {
        matches!(
            self,
            Self::Inexact {
                permission_denied: true
            }
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Inexact { .. } => "inexact",
        }
    }
}

/// A timer registration mirrored in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    /// Fire time in epoch milliseconds
    pub fire_at_ms: i64,
    /// Whether the timer was registered as exact
    pub exact: bool,
    /// Payload delivered when the timer fires
    #[serde(flatten)]
    pub payload: AlarmPayload,
}

/// Result of restoring persisted registrations after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Registrations re-armed for their original time
    pub rearmed: Vec<AlarmId>,
    /// Registrations whose time passed within the grace window; re-armed to fire now
    pub overdue: Vec<AlarmId>,
    /// Registrations too old to ring; discarded
    pub dropped: Vec<AlarmId>,
}

/// Gateway between alarm identities and the timer service.
pub struct SchedulingGateway {
    timers: Arc<dyn TimerService>,
    store: Arc<dyn KeyValueStore>,
}

impl SchedulingGateway {
    pub fn new(timers: Arc<dyn TimerService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { timers, store }
    }

    /// Returns true if the timer service currently permits exact timers.
    #[must_use]
    pub fn can_schedule_exact(&self) -> bool {
        self.timers.can_schedule_exact()
    }

    /// Schedules `payload` to fire at `fire_at_ms`.
    ///
    /// Any earlier registration of the same identity is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error only if neither an exact nor an inexact timer could
    /// be registered.
    pub fn schedule(
        &self,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let id = payload.alarm_id.clone();
        let token = callback_token(id.as_str());

        self.timers.cancel(token);

        let outcome = match self.timers.set_exact(token, fire_at_ms, payload.clone()) {
            Ok(()) => ScheduleOutcome::Exact,
            Err(exact_err) => {
                let permission_denied = exact_err.is_permission_error();
                tracing::warn!(
                    alarm_id = %id,
                    "正確なアラームを登録できません。通常のアラームで代替します: {}",
                    exact_err
                );
                self.timers
                    .set_inexact(token, fire_at_ms, payload.clone())
                    .map_err(|e| {
                        tracing::error!(alarm_id = %id, "アラームを登録できません: {}", e);
                        e
                    })?;
                ScheduleOutcome::Inexact { permission_denied }
            }
        };

        self.remember(&PendingRegistration {
            fire_at_ms,
            exact: outcome.is_exact(),
            payload,
        });

        tracing::info!(alarm_id = %id, token, fire_at_ms, outcome = outcome.as_str(), "alarm scheduled");
        Ok(outcome)
    }

    /// Cancels the registration of `id`; unknown identities are a no-op.
    ///
    /// Returns true if a pending timer was cancelled.
    pub fn cancel(&self, id: &AlarmId) -> bool {
        let cancelled = self.timers.cancel(callback_token(id.as_str()));
        self.forget(id);
        tracing::info!(alarm_id = %id, cancelled, "alarm cancelled");
        cancelled
    }

    /// Cancels every registration this gateway knows of.
    ///
    /// First cancels every identity in the durable pending index, then runs
    /// a cleanup sweep over raw tokens `0..1000` and the hashed identities
    /// `{"alarm-", "test-", "snooze-", ""} × 0..100`, for timers registered
    /// without an index entry. The sweep is a heuristic: a timer registered
    /// under any other unindexed identity is not reached.
    ///
    /// Returns the number of timers actually cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;

        for id in self.pending_ids() {
            if self.timers.cancel(callback_token(id.as_str())) {
                cancelled += 1;
            }
            self.forget(&id);
        }

        for token in 0..SWEEP_RAW_TOKENS {
            if self.timers.cancel(token) {
                cancelled += 1;
            }
        }

        for prefix in SWEEP_PREFIXES {
            for n in 0..SWEEP_SUFFIXES {
                if self.timers.cancel(callback_token(&format!("{prefix}{n}"))) {
                    cancelled += 1;
                }
            }
        }

        tracing::info!(cancelled, "all alarms cancelled");
        cancelled
    }

    /// Marks the registration of `id` as delivered.
    pub fn mark_fired(&self, id: &AlarmId) {
        self.forget(id);
    }

    /// Returns true if a timer for `id` is pending.
    #[must_use]
    pub fn is_scheduled(&self, id: &AlarmId) -> bool {
        self.timers.is_pending(callback_token(id.as_str()))
    }

    /// Returns the persisted pending registrations, ordered by fire time.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingRegistration> {
        let mut pending: Vec<PendingRegistration> = self
            .pending_ids()
            .iter()
            .filter_map(|id| self.load(id))
            .collect();
        pending.sort_by_key(|reg| reg.fire_at_ms);
        pending
    }

    /// Re-arms persisted registrations after a restart.
    ///
    /// Registrations in the future are re-armed for their original time.
    /// Registrations that passed less than `grace_ms` ago are re-armed to
    /// fire immediately; older ones are discarded.
    pub fn restore(&self, now_ms: i64, grace_ms: i64) -> RestoreReport {
        let mut report = RestoreReport::default();

        for reg in self.pending() {
            let id = reg.payload.alarm_id.clone();
            let fire_at_ms = if reg.fire_at_ms > now_ms {
                report.rearmed.push(id.clone());
                reg.fire_at_ms
            } else if now_ms - reg.fire_at_ms <= grace_ms {
                report.overdue.push(id.clone());
                now_ms
            } else {
                tracing::warn!(alarm_id = %id, fire_at_ms = reg.fire_at_ms, "期限切れのアラームを破棄します");
                self.forget(&id);
                report.dropped.push(id);
                continue;
            };

            if let Err(e) = self.schedule(fire_at_ms, reg.payload) {
                tracing::error!(alarm_id = %id, "アラームを復元できません: {}", e);
            }
        }

        report
    }

    fn pending_ids(&self) -> Vec<AlarmId> {
        match self.store.keys_with_prefix(PENDING_PREFIX) {
            Ok(keys) => keys
                .iter()
                .map(|key| AlarmId::new(&key[PENDING_PREFIX.len()..]))
                .collect(),
            Err(e) => {
                tracing::warn!("保留中のアラーム一覧を読み込めません: {}", e);
                Vec::new()
            }
        }
    }

    fn load(&self, id: &AlarmId) -> Option<PendingRegistration> {
        let value = self.store.get(&pending_key(id)).ok().flatten()?;
        match serde_json::from_value(value) {
            Ok(reg) => Some(reg),
            Err(e) => {
                tracing::warn!(alarm_id = %id, "保留中のアラームが破損しています: {}", e);
                None
            }
        }
    }

    fn remember(&self, reg: &PendingRegistration) {
        let result = serde_json::to_value(reg)
            .map_err(crate::store::StoreError::from)
            .and_then(|value| self.store.put(&pending_key(&reg.payload.alarm_id), value));
        if let Err(e) = result {
            tracing::warn!(alarm_id = %reg.payload.alarm_id, "アラームの登録情報を保存できません: {}", e);
        }
    }

    fn forget(&self, id: &AlarmId) {
        if let Err(e) = self.store.remove(&pending_key(id)) {
            tracing::warn!(alarm_id = %id, "アラームの登録情報を削除できません: {}", e);
        }
    }
}

fn pending_key(id: &AlarmId) -> String {
    format!("{PENDING_PREFIX}{id}")
}

// ============================================================================
// Tests
// ============================================================================
