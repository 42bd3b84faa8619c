//! Fired-alarm dispatcher.
//!
//! ```text
//! Idle ──deliver──▶ Firing ──session started──▶ Ringing
//!                      │
//!                      └──start rejected──────▶ Failed
//! ```
//!
//! A rejected start is not fatal: the session manager has already posted
//! the notification as the last way to reach the user.

use serde::{Deserialize, Serialize};

use super::AlarmContext;
use crate::types::AlarmPayload;

/// State of the fired-alarm dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiredState {
    Idle,
    Firing,
    Ringing,
    Failed,
}

impl FiredState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Firing => "firing",
            Self::Ringing => "ringing",
            Self::Failed => "failed",
        }
    }
}

/// Turns timer deliveries into ringing sessions.
#[derive(Debug)]
pub struct FiredAlarmDispatcher {
    state: FiredState,
    launch_full_screen: bool,
}

impl FiredAlarmDispatcher {
    /// Creates a dispatcher; `launch_full_screen` shows the alarm screen
    /// directly on every fire.
    #[must_use]
    pub fn new(launch_full_screen: bool) -> Self {
        Self {
            state: FiredState::Idle,
            launch_full_screen,
        }
    }

    #[must_use]
    pub fn state(&self) -> FiredState {
        self.state
    }

    /// Handles a timer delivery.
    pub fn on_fired(&mut self, ctx: &mut AlarmContext<'_>, payload: &AlarmPayload) -> FiredState {
        ctx.gateway.mark_fired(&payload.alarm_id);
        self.ring(ctx, payload)
    }

    /// Starts ringing for `payload` without a timer.
    pub fn ring(&mut self, ctx: &mut AlarmContext<'_>, payload: &AlarmPayload) -> FiredState {
        let alarm_id = &payload.alarm_id;
        self.state = FiredState::Firing;
        tracing::info!(alarm_id = %alarm_id, "alarm fired");

        if ctx.session.stop() {
            tracing::debug!(alarm_id = %alarm_id, "stale session stopped");
        }

        match ctx
            .session
            .start(alarm_id.clone(), &payload.audio_ref, &payload.label)
        {
            Ok(()) => {
                if self.launch_full_screen {
                    ctx.open_screen(alarm_id, &payload.label, &payload.audio_ref);
                }
                self.state = FiredState::Ringing;
            }
            Err(e) => {
                tracing::error!(alarm_id = %alarm_id, "{}", e);
                self.state = FiredState::Failed;
            }
        }

        self.state
    }

    /// Returns to `Idle` once the ringing alarm was handled.
    pub fn reset(&mut self) {
        self.state = FiredState::Idle;
    }
}
