//! Action dispatcher.
//!
//! Routes user actions to the session manager, the snooze policy and the
//! scheduling gateway. Stop and snooze are both safe to repeat: stop is
//! idempotent, and each repeated snooze advances the snooze sequence.

use super::{AlarmAction, AlarmContext};
use crate::scheduler::{ScheduleOutcome, SchedulerError};
use crate::snooze::SnoozePolicy;
use crate::types::{now_millis, AlarmEvent, AlarmId, AlarmPayload, SNOOZED_ALARM_LABEL};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// What dispatching an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Stopped {
        alarm_id: AlarmId,
        /// False if nothing was ringing
        was_ringing: bool,
    },
    Snoozed {
        alarm_id: AlarmId,
        /// Identity the snoozed alarm was re-armed under
        snooze_id: AlarmId,
        next_fire_time: i64,
        delay_minutes: u32,
        schedule: ScheduleOutcome,
    },
    /// The screen was re-opened and the notification reposted.
    Reasserted { alarm_id: AlarmId },
    Renotified { posted: bool },
    ScreenOpened { alarm_id: AlarmId },
}

/// Dispatcher for user actions.
#[derive(Debug)]
pub struct ActionDispatcher {
    policy: SnoozePolicy,
}

impl ActionDispatcher {
    #[must_use]
    pub fn new(policy: SnoozePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &SnoozePolicy {
        &self.policy
    }

    /// Dispatches `action`.
    ///
    /// # Errors
    ///
    /// Returns an error only if a snooze could not be re-armed. The ringing
    /// session is stopped in that case all the same.
    pub fn dispatch(
        &self,
        ctx: &mut AlarmContext<'_>,
        action: AlarmAction,
    ) -> Result<ActionOutcome, SchedulerError> {
        tracing::debug!(action = action.name(), "dispatching action");

        match action {
            AlarmAction::Stop { alarm_id } => Ok(self.stop(ctx, alarm_id)),
            AlarmAction::Snooze {
                alarm_id,
                audio_ref,
            } => self.snooze(ctx, alarm_id, audio_ref),
            AlarmAction::DismissAttempt {
                alarm_id,
                audio_ref,
            } => Ok(Self::reassert(ctx, alarm_id, audio_ref)),
            AlarmAction::Renotify => Ok(ActionOutcome::Renotified {
                posted: ctx.session.renotify(),
            }),
            AlarmAction::OpenScreen { alarm_id } => Ok(Self::open(ctx, alarm_id)),
        }
    }

    fn stop(&self, ctx: &mut AlarmContext<'_>, alarm_id: AlarmId) -> ActionOutcome {
        let was_ringing = ctx.session.stop();
        ctx.screen.close();
        self.policy.reset(&alarm_id.base());
        ctx.events.emit(AlarmEvent::Stopped {
            alarm_id: alarm_id.clone(),
        });

        tracing::info!(alarm_id = %alarm_id, was_ringing, "alarm stopped");
        ActionOutcome::Stopped {
            alarm_id,
            was_ringing,
        }
    }

    fn snooze(
        &self,
        ctx: &mut AlarmContext<'_>,
        alarm_id: AlarmId,
        audio_ref: String,
    ) -> Result<ActionOutcome, SchedulerError> {
        ctx.session.stop();
        ctx.screen.close();

        let base = alarm_id.base();
        let delay_minutes = self.policy.next_delay(&base);
        let now = now_millis();
        let snooze_id = base.snooze_instance(now);
        let next_fire_time = now + i64::from(delay_minutes) * MILLIS_PER_MINUTE;

        let schedule = ctx.gateway.schedule(
            next_fire_time,
            AlarmPayload::new(snooze_id.clone(), audio_ref, SNOOZED_ALARM_LABEL),
        )?;

        ctx.events.emit(AlarmEvent::Snoozed {
            alarm_id: alarm_id.clone(),
            next_fire_time,
            delay_minutes,
        });

        tracing::info!(
            alarm_id = %alarm_id,
            snooze_id = %snooze_id,
            delay_minutes,
            "alarm snoozed"
        );
        Ok(ActionOutcome::Snoozed {
            alarm_id,
            snooze_id,
            next_fire_time,
            delay_minutes,
            schedule,
        })
    }

    fn reassert(ctx: &mut AlarmContext<'_>, alarm_id: AlarmId, audio_ref: String) -> ActionOutcome {
        let label = ctx
            .session
            .current()
            .map(|session| session.label.clone())
            .unwrap_or_default();
        ctx.open_screen(&alarm_id, &label, &audio_ref);
        ctx.session.renotify();

        tracing::info!(alarm_id = %alarm_id, "notification dismissal reasserted");
        ActionOutcome::Reasserted { alarm_id }
    }

    fn open(ctx: &mut AlarmContext<'_>, alarm_id: AlarmId) -> ActionOutcome {
        let (label, audio_ref) = ctx
            .session
            .current()
            .map(|session| (session.label.clone(), session.audio_ref.clone()))
            .unwrap_or_default();
        ctx.open_screen(&alarm_id, &label, &audio_ref);
        ActionOutcome::ScreenOpened { alarm_id }
    }
}

// ============================================================================
// Tests
// ============================================================================
