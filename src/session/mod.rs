//! Ringing session manager.
//!
//! Owns the single live ringing session: audio, vibration, wake lock and
//! the ringing notification. Starting a session always tears down the
//! previous one first, so two alarms never sound at once.
//!
//! # Audio sub-state machine
//!
//! ```text
//!            prepare(source)            Prepared
//!   Idle ──────────────────▶ Preparing ─────────▶ Playing
//!                               │                   │
//!                         Error │                   │ Error
//!                               ▼                   ▼
//!                          Recovering ◀─────────────┘   (first error only;
//!                               │                        retries the bundled
//!                     Prepared  │  Error                 tone)
//!                   ┌───────────┴──────────┐
//!                   ▼                      ▼
//!                Playing                 Failed  (player released; the
//!                                                 session keeps vibrating
//!                                                 and notifying)
//! ```
//!
//! Every preparation carries a generation number. Results that arrive for
//! an older generation (a stopped session, a superseded preparation) are
//! dropped, which is how a `stop()` during preparation discards the pending
//! start.

mod error;
pub mod vibration;
pub mod wakelock;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::SessionError;
pub use vibration::{LogVibrator, MockVibrator, Vibrator, VIBRATION_PATTERN, VIBRATION_REPEAT_FROM};
pub use wakelock::{default_inhibitor_command, InhibitorWakeLock, MockWakeLock, WakeLock};

use crate::notification::{AlarmNotification, AlarmNotifier, NOTIFICATION_ID};
use crate::sound::{AudioBackend, AudioEvent, AudioResolver, ResolvedAudio};
use crate::types::{now_millis, AlarmId, SessionStatus};

// ============================================================================
// AudioState
// ============================================================================

/// Audio sub-state of a ringing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioState {
    /// No preparation requested
    Idle,
    /// Waiting for the backend to prepare the resolved source
    Preparing,
    /// Looping playback
    Playing,
    /// Retrying with the bundled tone after an error
    Recovering,
    /// Audio abandoned for this session
    Failed,
}

impl AudioState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Playing => "playing",
            Self::Recovering => "recovering",
            Self::Failed => "failed",
        }
    }
}

// ============================================================================
// RingingSession
// ============================================================================

/// The live ringing session.
#[derive(Debug, Clone)]
pub struct RingingSession {
    /// Correlates log lines of one session
    pub session_id: Uuid,
    pub alarm_id: AlarmId,
    pub audio_ref: String,
    pub label: String,
    /// Source currently being prepared or played
    pub source: ResolvedAudio,
    pub audio: AudioState,
    /// True once the bundled-tone retry has been used
    pub retried: bool,
    pub vibrating: bool,
    pub wake_lock_held: bool,
    pub started_at: i64,
}

impl RingingSession {
    fn notification(&self) -> AlarmNotification {
        AlarmNotification::ringing(&self.alarm_id, &self.label, &self.audio_ref)
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session_id.to_string(),
            alarm_id: self.alarm_id.clone(),
            label: self.label.clone(),
            audio_ref: self.audio_ref.clone(),
            source: self.source.describe(),
            audio_state: self.audio.as_str().to_string(),
            vibrating: self.vibrating,
            wake_lock_held: self.wake_lock_held,
            started_at: self.started_at,
        }
    }
}

// ============================================================================
// RingingSessionManager
// ============================================================================

/// Holder of the single ringing session.
pub struct RingingSessionManager {
    notifier: Arc<dyn AlarmNotifier>,
    audio: Arc<dyn AudioBackend>,
    vibrator: Arc<dyn Vibrator>,
    wake_lock: Arc<dyn WakeLock>,
    resolver: AudioResolver,
    session: Option<RingingSession>,
    generation: u64,
}

impl RingingSessionManager {
    pub fn new(
        notifier: Arc<dyn AlarmNotifier>,
        audio: Arc<dyn AudioBackend>,
        vibrator: Arc<dyn Vibrator>,
        wake_lock: Arc<dyn WakeLock>,
        resolver: AudioResolver,
    ) -> Self {
        Self {
            notifier,
            audio,
            vibrator,
            wake_lock,
            resolver,
            session: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn current(&self) -> Option<&RingingSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(RingingSession::status)
    }

    /// Returns the generation of the latest preparation request.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if notifications can currently be shown.
    #[must_use]
    pub fn notifications_enabled(&self) -> bool {
        self.notifier.is_enabled()
    }

    /// Starts ringing for `alarm_id`, replacing any active session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::StartRejected`] if the system refuses the
    /// foreground grant. The notification is still posted in that case.
    pub fn start(
        &mut self,
        alarm_id: AlarmId,
        audio_ref: &str,
        label: &str,
    ) -> Result<(), SessionError> {
        if self.stop() {
            tracing::debug!(alarm_id = %alarm_id, "previous session stopped before start");
        }

        let wake_lock_held = match self.wake_lock.acquire() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(alarm_id = %alarm_id, "{}", e);
                false
            }
        };

        let notification = AlarmNotification::ringing(&alarm_id, label, audio_ref);
        if let Err(e) = self.notifier.start_foreground(&notification) {
            tracing::error!(alarm_id = %alarm_id, "{}", e);
            if let Err(post_err) = self.notifier.post(&notification) {
                tracing::warn!(alarm_id = %alarm_id, "{}", post_err);
            }
            if wake_lock_held {
                self.wake_lock.release();
            }
            return Err(SessionError::StartRejected(e.to_string()));
        }

        let vibrating = self
            .vibrator
            .vibrate(&VIBRATION_PATTERN, Some(VIBRATION_REPEAT_FROM));

        let source = self.resolver.resolve_or_bundled(audio_ref);
        let session = RingingSession {
            session_id: Uuid::new_v4(),
            alarm_id,
            audio_ref: audio_ref.to_string(),
            label: label.to_string(),
            source: source.clone(),
            audio: AudioState::Idle,
            retried: false,
            vibrating,
            wake_lock_held,
            started_at: now_millis(),
        };
        tracing::info!(
            session_id = %session.session_id,
            alarm_id = %session.alarm_id,
            source = %source.describe(),
            "ringing session started"
        );
        self.session = Some(session);

        self.prepare(source, AudioState::Preparing);
        Ok(())
    }

    /// Stops the active session. Returns false if none was active.
    pub fn stop(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            tracing::debug!("stop requested with no active session");
            return false;
        };

        // Outstanding preparation results now belong to a stale generation.
        self.generation += 1;

        self.audio.release();
        self.vibrator.cancel();
        if session.wake_lock_held {
            self.wake_lock.release();
        }
        self.notifier.cancel(NOTIFICATION_ID);
        self.notifier.stop_foreground();

        tracing::info!(
            session_id = %session.session_id,
            alarm_id = %session.alarm_id,
            "ringing session stopped"
        );
        true
    }

    /// Reposts the ringing notification without touching audio.
    ///
    /// Returns false if no session is active.
    pub fn renotify(&self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if let Err(e) = self.notifier.post(&session.notification()) {
            tracing::warn!(alarm_id = %session.alarm_id, "{}", e);
        }
        true
    }

    /// Applies a result reported by the audio backend.
    pub fn on_audio_event(&mut self, event: AudioEvent) {
        if self.session.is_none() || event.generation() != self.generation {
            tracing::debug!(
                generation = event.generation(),
                current = self.generation,
                "stale audio event dropped"
            );
            return;
        }

        match event {
            AudioEvent::Prepared { generation } => self.on_prepared(generation),
            AudioEvent::Error { message, .. } => self.on_audio_error(&message),
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn prepare(&mut self, source: ResolvedAudio, state: AudioState) {
        self.generation += 1;
        let generation = self.generation;

        if let Some(session) = self.session.as_mut() {
            session.source = source.clone();
            session.audio = state;
            tracing::debug!(generation, state = state.as_str(), "audio preparing");
        }

        if let Err(e) = self.audio.prepare(generation, &source) {
            self.on_audio_error(&e.to_string());
        }
    }

    fn on_prepared(&mut self, generation: u64) {
        match self.audio.start(generation) {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.audio = AudioState::Playing;
                    tracing::debug!(session_id = %session.session_id, "audio playing");
                }
            }
            Err(e) => self.on_audio_error(&e.to_string()),
        }
    }

    fn on_audio_error(&mut self, message: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if !session.retried {
            session.retried = true;
            tracing::warn!(
                session_id = %session.session_id,
                source = %session.source.describe(),
                "アラーム音を再生できません。内蔵のアラーム音で再試行します: {}",
                message
            );
            self.prepare(ResolvedAudio::Bundled, AudioState::Recovering);
            return;
        }

        session.audio = AudioState::Failed;
        tracing::error!(
            session_id = %session.session_id,
            "アラーム音の再生を中止しました (バイブレーションと通知は継続): {}",
            message
        );
        self.audio.release();
    }
}

impl std::fmt::Debug for RingingSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingingSessionManager")
            .field("session", &self.session)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
