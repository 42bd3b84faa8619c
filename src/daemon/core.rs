//! The alarm core.
//!
//! Owns every component of the daemon and exposes the boundary operations.
//! The daemon shares one core behind a `tokio::sync::Mutex`; IPC requests,
//! timer deliveries, audio events and notification responses each take the
//! lock, so they are handled one at a time.

use std::sync::Arc;

use thiserror::Error;

use crate::config::AlarmConfig;
use crate::dispatch::{
    ActionDispatcher, ActionExtras, ActionOutcome, AlarmAction, AlarmContext,
    FiredAlarmDispatcher, FiredState,
};
use crate::platform::{self, PlatformError, SettingsOpener, SettingsSurface};
use crate::scheduler::{FiredAlarm, RestoreReport, ScheduleOutcome, SchedulerError, SchedulingGateway};
use crate::screen::AlarmScreen;
use crate::session::RingingSessionManager;
use crate::snooze::SnoozePolicy;
use crate::sound::AudioEvent;
use crate::types::{AlarmId, AlarmPayload, EventLog, EventRecord, PermissionStatus, ResponseData};

// ============================================================================
// CoreError
// ============================================================================

/// Errors from boundary operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("不明なアクションです: {0}")]
    UnknownAction(String),

    #[error("鳴っているアラームはありません")]
    NotRinging,

    #[error("アラーム {0} を鳴らせませんでした")]
    RingFailed(AlarmId),

    #[error(transparent)]
    Schedule(#[from] SchedulerError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl CoreError {
    /// Returns true if this error is related to permissions.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::Schedule(e) if e.is_permission_error())
    }
}

// ============================================================================
// AlarmCore
// ============================================================================

/// Settings of the core taken from [`AlarmConfig`].
#[derive(Debug, Clone)]
pub struct CoreOptions {
    pub launch_full_screen: bool,
    pub wake_lock_command: Vec<String>,
    pub manufacturer: String,
}

impl From<&AlarmConfig> for CoreOptions {
    fn from(config: &AlarmConfig) -> Self {
        Self {
            launch_full_screen: config.launch_full_screen,
            wake_lock_command: config.wake_lock_command.clone(),
            manufacturer: config.manufacturer.clone(),
        }
    }
}

/// All alarm components wired together.
pub struct AlarmCore {
    session: RingingSessionManager,
    gateway: SchedulingGateway,
    screen: Arc<dyn AlarmScreen>,
    settings: Arc<dyn SettingsOpener>,
    events: EventLog,
    fired: FiredAlarmDispatcher,
    actions: ActionDispatcher,
    options: CoreOptions,
}

impl AlarmCore {
    pub fn new(
        session: RingingSessionManager,
        gateway: SchedulingGateway,
        policy: SnoozePolicy,
        screen: Arc<dyn AlarmScreen>,
        settings: Arc<dyn SettingsOpener>,
        options: CoreOptions,
    ) -> Self {
        Self {
            session,
            gateway,
            screen,
            settings,
            events: EventLog::new(),
            fired: FiredAlarmDispatcher::new(options.launch_full_screen),
            actions: ActionDispatcher::new(policy),
            options,
        }
    }

    #[must_use]
    pub fn session(&self) -> &RingingSessionManager {
        &self.session
    }

    #[must_use]
    pub fn gateway(&self) -> &SchedulingGateway {
        &self.gateway
    }

    #[must_use]
    pub fn policy(&self) -> &SnoozePolicy {
        self.actions.policy()
    }

    #[must_use]
    pub fn fired_state(&self) -> FiredState {
        self.fired.state()
    }

    // ------------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------------

    /// Registers an alarm; an empty id becomes `"default"`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither an exact nor a best-effort timer could
    /// be registered.
    pub fn schedule_alarm(
        &self,
        alarm_id: &str,
        fire_at_ms: i64,
        audio_ref: &str,
        label: &str,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let payload = AlarmPayload::new(AlarmId::new(alarm_id), audio_ref, label);
        self.gateway.schedule(fire_at_ms, payload)
    }

    /// Cancels one alarm. Unknown ids are a no-op.
    pub fn cancel_alarm(&self, alarm_id: &str) -> bool {
        self.gateway.cancel(&AlarmId::new(alarm_id))
    }

    /// Cancels every known alarm and returns how many were cancelled.
    pub fn cancel_all_alarms(&self) -> usize {
        self.gateway.cancel_all()
    }

    /// Re-arms persisted registrations after a restart.
    pub fn restore(&self, now_ms: i64, grace_ms: i64) -> RestoreReport {
        self.gateway.restore(now_ms, grace_ms)
    }

    // ------------------------------------------------------------------------
    // Ringing
    // ------------------------------------------------------------------------

    /// Handles a timer delivery.
    pub fn on_fired(&mut self, alarm: FiredAlarm) -> FiredState {
        let mut ctx = AlarmContext {
            session: &mut self.session,
            gateway: &self.gateway,
            screen: self.screen.as_ref(),
            events: &mut self.events,
        };
        self.fired.on_fired(&mut ctx, &alarm.payload)
    }

    /// Starts ringing now, without a timer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RingFailed`] if the session could not start.
    /// The notification has been posted even then.
    pub fn start_immediate_alarm(
        &mut self,
        alarm_id: &str,
        audio_ref: &str,
        label: &str,
    ) -> Result<AlarmId, CoreError> {
        let payload = AlarmPayload::new(AlarmId::new(alarm_id), audio_ref, label);
        let mut ctx = AlarmContext {
            session: &mut self.session,
            gateway: &self.gateway,
            screen: self.screen.as_ref(),
            events: &mut self.events,
        };
        match self.fired.ring(&mut ctx, &payload) {
            FiredState::Failed => Err(CoreError::RingFailed(payload.alarm_id)),
            _ => Ok(payload.alarm_id),
        }
    }

    /// Forwards an audio readiness event to the session.
    pub fn on_audio_event(&mut self, event: AudioEvent) {
        self.session.on_audio_event(event);
    }

    /// Releases the ringing session without treating it as a user stop.
    ///
    /// Snooze counters and the event log are left untouched.
    pub fn shutdown(&mut self) {
        if self.session.stop() {
            tracing::info!("ringing session released on shutdown");
        }
        self.screen.close();
        self.fired.reset();
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Stops the ringing alarm. A no-op when nothing rings.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other actions.
    pub fn stop_current_alarm(&mut self) -> Result<ActionOutcome, CoreError> {
        let Some(current) = self.session.current() else {
            tracing::debug!("stop requested with no ringing alarm");
            return Ok(ActionOutcome::Stopped {
                alarm_id: AlarmId::default(),
                was_ringing: false,
            });
        };
        let alarm_id = current.alarm_id.clone();
        self.dispatch(AlarmAction::Stop { alarm_id })
    }

    /// Snoozes the ringing alarm.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotRinging`] when nothing rings, or a scheduling
    /// error if the snooze could not be re-armed.
    pub fn snooze_current_alarm(&mut self) -> Result<ActionOutcome, CoreError> {
        let current = self.session.current().ok_or(CoreError::NotRinging)?;
        let action = AlarmAction::Snooze {
            alarm_id: current.alarm_id.clone(),
            audio_ref: current.audio_ref.clone(),
        };
        self.dispatch(action)
    }

    /// Handles a native action name.
    ///
    /// Missing extras are taken from the ringing session; native
    /// notification responses carry only the action identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAction`] for names that are not alarm
    /// actions.
    pub fn handle_action(
        &mut self,
        action: &str,
        mut extras: ActionExtras,
    ) -> Result<ActionOutcome, CoreError> {
        if let Some(current) = self.session.current() {
            extras
                .alarm_id
                .get_or_insert_with(|| current.alarm_id.as_str().to_string());
            extras
                .audio_ref
                .get_or_insert_with(|| current.audio_ref.clone());
        }

        let decoded = AlarmAction::decode(action, &extras)
            .ok_or_else(|| CoreError::UnknownAction(action.to_string()))?;
        self.dispatch(decoded)
    }

    fn dispatch(&mut self, action: AlarmAction) -> Result<ActionOutcome, CoreError> {
        let mut ctx = AlarmContext {
            session: &mut self.session,
            gateway: &self.gateway,
            screen: self.screen.as_ref(),
            events: &mut self.events,
        };
        let result = self.actions.dispatch(&mut ctx, action);

        if !self.session.is_active() {
            self.fired.reset();
        }
        result.map_err(CoreError::from)
    }

    // ------------------------------------------------------------------------
    // Platform
    // ------------------------------------------------------------------------

    /// Reports the capabilities that affect alarm reliability.
    #[must_use]
    pub fn check_permissions(&self) -> PermissionStatus {
        platform::permission_status(
            self.gateway.can_schedule_exact(),
            platform::battery_unrestricted(&self.options.wake_lock_command),
            self.session.notifications_enabled(),
            &self.options.manufacturer,
        )
    }

    /// Opens a settings surface without waiting for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the opener could not be launched.
    pub fn open_settings(&self, surface: SettingsSurface) -> Result<(), CoreError> {
        self.settings.open(surface)?;
        Ok(())
    }

    /// Opens the power-management settings.
    ///
    /// # Errors
    ///
    /// See [`AlarmCore::open_settings`].
    pub fn request_battery_exemption(&self) -> Result<(), CoreError> {
        self.open_settings(SettingsSurface::Battery)
    }

    /// Opens the exact-timer setting.
    ///
    /// # Errors
    ///
    /// See [`AlarmCore::open_settings`].
    pub fn request_exact_timer_permission(&self) -> Result<(), CoreError> {
        self.open_settings(SettingsSurface::ExactTimer)
    }

    /// Opens the app's notification settings.
    ///
    /// # Errors
    ///
    /// See [`AlarmCore::open_settings`].
    pub fn open_app_settings(&self) -> Result<(), CoreError> {
        self.open_settings(SettingsSurface::App)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns session, dispatcher and pending-alarm state.
    #[must_use]
    pub fn status(&self) -> ResponseData {
        ResponseData {
            session: self.session.status(),
            dispatcher: Some(self.fired.state().as_str().to_string()),
            pending: Some(self.gateway.pending()),
            last_seq: Some(self.events.last_seq()),
            ..Default::default()
        }
    }

    /// Returns retained events newer than `seq`.
    #[must_use]
    pub fn events_since(&self, seq: u64) -> Vec<EventRecord> {
        self.events.since(seq)
    }

    #[must_use]
    pub fn last_event_seq(&self) -> u64 {
        self.events.last_seq()
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::harness::CoreHarness;
    use super::*;
    use crate::notification::action_ids;
    use crate::scheduler::callback_token;
    use crate::screen::AlarmScreen;
    use crate::session::WakeLock;
    use crate::types::{now_millis, AlarmEvent};

    fn fire(h: &mut CoreHarness, id: &str) -> FiredState {
        let alarm = h
            .timers
            .fire(callback_token(id))
            .expect("alarm should be registered");
        h.core.on_fired(alarm)
    }

    // ------------------------------------------------------------------------
    // Scheduling Tests
    // ------------------------------------------------------------------------

    mod scheduling_tests {
        use super::*;

        #[test]
        fn test_schedule_and_cancel() {
            let h = CoreHarness::new();
            let at = now_millis() + 60_000;

            let outcome = h.core.schedule_alarm("a1", at, "", "Wake").unwrap();
            assert!(outcome.is_exact());
            assert!(h.core.gateway().is_scheduled(&AlarmId::new("a1")));

            assert!(h.core.cancel_alarm("a1"));
            assert!(!h.core.gateway().is_scheduled(&AlarmId::new("a1")));
            assert!(h.timers.registration(callback_token("a1")).is_none());
        }

        #[test]
        fn test_schedule_without_exact_permission() {
            let h = CoreHarness::new();
            h.timers.set_exact_allowed(false);

            let outcome = h.core.schedule_alarm("a1", 1_000, "", "").unwrap();
            assert!(!outcome.is_exact());
            assert!(outcome.permission_denied());
        }

        #[test]
        fn test_empty_id_becomes_default() {
            let h = CoreHarness::new();
            h.core.schedule_alarm("", 1_000, "", "").unwrap();
            assert!(h.core.gateway().is_scheduled(&AlarmId::default()));
        }

        #[test]
        fn test_cancel_all() {
            let h = CoreHarness::new();
            h.core.schedule_alarm("a1", 1_000, "", "").unwrap();
            h.core.schedule_alarm("b2", 2_000, "", "").unwrap();

            assert_eq!(h.core.cancel_all_alarms(), 2);
            assert!(h.core.gateway().pending().is_empty());
        }
    }

    // ------------------------------------------------------------------------
    // Ringing Tests
    // ------------------------------------------------------------------------

    mod ringing_tests {
        use super::*;

        #[test]
        fn test_fire_rings() {
            let mut h = CoreHarness::new();
            h.core.schedule_alarm("a1", 1_000, "", "Wake").unwrap();

            assert_eq!(fire(&mut h, "a1"), FiredState::Ringing);
            assert!(h.core.session().is_active());
            assert!(h.wake_lock.is_held());
            assert!(h.screen.is_visible());
            assert!(h.core.gateway().pending().is_empty());
        }

        #[test]
        fn test_start_immediate() {
            let mut h = CoreHarness::new();
            let id = h.core.start_immediate_alarm("", "", "Now").unwrap();

            assert_eq!(id, AlarmId::default());
            assert_eq!(h.core.fired_state(), FiredState::Ringing);
        }

        #[test]
        fn test_shutdown_releases_without_event() {
            let mut h = CoreHarness::new();
            h.core.start_immediate_alarm("a1", "", "").unwrap();
            let seq = h.core.last_event_seq();

            h.core.shutdown();
            assert!(!h.core.session().is_active());
            assert!(!h.wake_lock.is_held());
            assert_eq!(h.core.last_event_seq(), seq);
        }

        #[test]
        fn test_start_immediate_rejected() {
            let mut h = CoreHarness::new();
            h.notifier.set_reject_foreground(true);

            let result = h.core.start_immediate_alarm("a1", "", "");
            assert!(matches!(result, Err(CoreError::RingFailed(_))));
            assert!(h.notifier.visible().is_some());
        }
    }

    // ------------------------------------------------------------------------
    // Action Tests
    // ------------------------------------------------------------------------

    mod action_tests {
        use super::*;

        #[test]
        fn test_stop_without_session_is_noop() {
            let mut h = CoreHarness::new();
            let outcome = h.core.stop_current_alarm().unwrap();

            assert_eq!(
                outcome,
                ActionOutcome::Stopped {
                    alarm_id: AlarmId::default(),
                    was_ringing: false
                }
            );
            assert_eq!(h.core.last_event_seq(), 0);
            assert_eq!(h.audio.release_count(), 0);
        }

        #[test]
        fn test_stop_ringing_alarm() {
            let mut h = CoreHarness::new();
            h.core.start_immediate_alarm("a1", "", "").unwrap();

            let outcome = h.core.stop_current_alarm().unwrap();
            assert!(matches!(
                outcome,
                ActionOutcome::Stopped {
                    was_ringing: true,
                    ..
                }
            ));
            assert!(!h.core.session().is_active());
            assert!(!h.wake_lock.is_held());
            assert_eq!(h.core.fired_state(), FiredState::Idle);
            assert_eq!(
                h.core.events_since(0).last().map(|r| r.event.clone()),
                Some(AlarmEvent::Stopped {
                    alarm_id: AlarmId::new("a1")
                })
            );
        }

        #[test]
        fn test_fire_then_snooze() {
            let mut h = CoreHarness::new();
            h.core.schedule_alarm("a1", 1_000, "song.mp3", "Wake").unwrap();
            fire(&mut h, "a1");
            let before = now_millis();

            let outcome = h.core.snooze_current_alarm().unwrap();
            let ActionOutcome::Snoozed {
                snooze_id,
                next_fire_time,
                delay_minutes,
                ..
            } = outcome
            else {
                panic!("expected snooze");
            };

            assert!(!h.core.session().is_active());
            assert_eq!(delay_minutes, 5);
            assert_eq!(snooze_id.base(), AlarmId::new("a1"));
            assert!(next_fire_time >= before + 5 * 60_000);
            assert!(h.core.gateway().is_scheduled(&snooze_id));
            assert_eq!(h.core.fired_state(), FiredState::Idle);
        }

        #[test]
        fn test_snooze_without_session() {
            let mut h = CoreHarness::new();
            assert!(matches!(
                h.core.snooze_current_alarm(),
                Err(CoreError::NotRinging)
            ));
        }

        #[test]
        fn test_notification_button_uses_session() {
            let mut h = CoreHarness::new();
            h.core.start_immediate_alarm("a1", "song.mp3", "").unwrap();

            let outcome = h
                .core
                .handle_action(action_ids::SNOOZE, ActionExtras::default())
                .unwrap();
            assert!(matches!(
                outcome,
                ActionOutcome::Snoozed { alarm_id, .. } if alarm_id == AlarmId::new("a1")
            ));
        }

        #[test]
        fn test_unknown_action() {
            let mut h = CoreHarness::new();
            let result = h.core.handle_action("PAUSE", ActionExtras::default());
            assert!(matches!(result, Err(CoreError::UnknownAction(_))));
        }

        #[test]
        fn test_snooze_failure_surfaces() {
            let mut h = CoreHarness::new();
            h.core.start_immediate_alarm("a1", "", "").unwrap();
            h.timers.set_fail_exact(true);
            h.timers.set_fail_inexact(true);

            let result = h.core.snooze_current_alarm();
            assert!(matches!(result, Err(CoreError::Schedule(_))));
            assert!(!h.core.session().is_active());
            assert_eq!(h.core.fired_state(), FiredState::Idle);
        }
    }

    // ------------------------------------------------------------------------
    // Platform Tests
    // ------------------------------------------------------------------------

    mod platform_tests {
        use super::*;

        #[test]
        fn test_check_permissions() {
            let h = CoreHarness::new();
            let status = h.core.check_permissions();

            assert!(status.can_schedule_exact_timers);
            assert!(status.notifications_enabled);
            assert!(!status.battery_unrestricted);
            assert!(!status.all_granted);
            assert!(status.oem_instructions.starts_with("Xiaomi"));
        }

        #[test]
        fn test_open_settings() {
            let h = CoreHarness::new();
            h.core.request_battery_exemption().unwrap();
            h.core.request_exact_timer_permission().unwrap();
            h.core.open_app_settings().unwrap();

            assert_eq!(
                h.settings.opened(),
                vec![
                    SettingsSurface::Battery,
                    SettingsSurface::ExactTimer,
                    SettingsSurface::App
                ]
            );
        }

        #[test]
        fn test_status() {
            let mut h = CoreHarness::new();
            h.core.schedule_alarm("b2", 9_000, "", "").unwrap();
            h.core.start_immediate_alarm("a1", "", "").unwrap();

            let data = h.core.status();
            assert_eq!(data.dispatcher.as_deref(), Some("ringing"));
            assert_eq!(data.session.unwrap().alarm_id, AlarmId::new("a1"));
            assert_eq!(data.pending.unwrap().len(), 1);
        }
    }
}
