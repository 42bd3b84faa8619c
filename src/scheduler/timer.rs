//! Wake-capable timer services.
//!
//! A [`TimerService`] registers one-shot timers keyed by a 32-bit callback
//! token. Registering a token that is already pending replaces it. When a
//! timer fires, the service delivers a [`FiredAlarm`] to the daemon.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::error::SchedulerError;
use crate::types::{now_millis, AlarmPayload};

/// Longest single sleep of an exact timer before the wall clock is rechecked.
const EXACT_SLICE: Duration = Duration::from_secs(1);

/// Longest single sleep of an inexact timer before the wall clock is rechecked.
const INEXACT_SLICE: Duration = Duration::from_secs(30);

/// A timer that reached its fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlarm {
    /// Callback token the timer was registered with
    pub token: i32,
    /// Scheduled fire time in epoch milliseconds
    pub fire_at_ms: i64,
    /// Whether the timer was exact
    pub exact: bool,
    /// Payload given at registration
    pub payload: AlarmPayload,
}

/// One-shot timer registration service.
pub trait TimerService: Send + Sync {
    /// Returns true if exact timers are currently permitted.
    fn can_schedule_exact(&self) -> bool;

    /// Registers an exact, idle-tolerant timer.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ExactPermissionDenied`] when exact timers
    /// are not permitted, or another error if registration fails.
    fn set_exact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError>;

    /// Registers a best-effort timer with no exactness guarantee.
    fn set_inexact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError>;

    /// Cancels the timer with `token`; returns true if one was pending.
    fn cancel(&self, token: i32) -> bool;

    /// Returns true if a timer with `token` is pending.
    fn is_pending(&self, token: i32) -> bool;
}

impl<T: TimerService + ?Sized> TimerService for Arc<T> {
    fn can_schedule_exact(&self) -> bool {
        (**self).can_schedule_exact()
    }

    fn set_exact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError> {
        (**self).set_exact(token, fire_at_ms, payload)
    }

    fn set_inexact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError> {
        (**self).set_inexact(token, fire_at_ms, payload)
    }

    fn cancel(&self, token: i32) -> bool {
        (**self).cancel(token)
    }

    fn is_pending(&self, token: i32) -> bool {
        (**self).is_pending(token)
    }
}

// ============================================================================
// TokioTimerService
// ============================================================================

/// Timer service running one tokio task per registration.
///
/// Tasks sleep in bounded slices and recheck the wall clock between slices,
/// so a timer still fires on time after the machine was suspended or the
/// clock was changed. Inexact timers use coarser slices.
pub struct TokioTimerService {
    exact_allowed: bool,
    fired_tx: UnboundedSender<FiredAlarm>,
    tasks: Mutex<HashMap<i32, JoinHandle<()>>>,
}

impl TokioTimerService {
    /// Creates a service delivering fired timers to `fired_tx`.
    pub fn new(fired_tx: UnboundedSender<FiredAlarm>, exact_allowed: bool) -> Self {
        Self {
            exact_allowed,
            fired_tx,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn register(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
        exact: bool,
    ) -> Result<(), SchedulerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::ServiceUnavailable(e.to_string()))?;

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| SchedulerError::ServiceUnavailable("timer table poisoned".into()))?;

        if let Some(previous) = tasks.remove(&token) {
            previous.abort();
        }
        tasks.retain(|_, handle| !handle.is_finished());

        let tx = self.fired_tx.clone();
        let slice = if exact { EXACT_SLICE } else { INEXACT_SLICE };
        let handle = runtime.spawn(async move {
            sleep_until_wall_clock(fire_at_ms, slice).await;
            let fired = FiredAlarm {
                token,
                fire_at_ms,
                exact,
                payload,
            };
            if tx.send(fired).is_err() {
                tracing::warn!(token, "タイマー受信側が閉じています");
            }
        });

        tasks.insert(token, handle);
        tracing::debug!(token, fire_at_ms, exact, "timer registered");
        Ok(())
    }
}

impl TimerService for TokioTimerService {
    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed
    }

    fn set_exact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError> {
        if !self.exact_allowed {
            return Err(SchedulerError::ExactPermissionDenied);
        }
        self.register(token, fire_at_ms, payload, true)
    }

    fn set_inexact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError> {
        self.register(token, fire_at_ms, payload, false)
    }

    fn cancel(&self, token: i32) -> bool {
        let Ok(mut tasks) = self.tasks.lock() else {
            return false;
        };
        match tasks.remove(&token) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    fn is_pending(&self, token: i32) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.get(&token).is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
    }
}

/// Sleeps until the wall clock reaches `fire_at_ms`.
async fn sleep_until_wall_clock(fire_at_ms: i64, slice: Duration) {
    loop {
        let remaining = fire_at_ms - now_millis();
        if remaining <= 0 {
            return;
        }
        let nap = Duration::from_millis(remaining as u64).min(slice);
        tokio::time::sleep(nap).await;
    }
}

// ============================================================================
// MockTimerService
// ============================================================================

/// A registration recorded by [`MockTimerService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRegistration {
    pub fire_at_ms: i64,
    pub exact: bool,
    pub payload: AlarmPayload,
}

/// Mock timer service for testing.
#[derive(Debug)]
pub struct MockTimerService {
    registrations: Mutex<HashMap<i32, MockRegistration>>,
    exact_allowed: std::sync::atomic::AtomicBool,
    fail_exact: std::sync::atomic::AtomicBool,
    fail_inexact: std::sync::atomic::AtomicBool,
    cancel_calls: std::sync::atomic::AtomicUsize,
}

impl Default for MockTimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTimerService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(HashMap::new()),
            exact_allowed: std::sync::atomic::AtomicBool::new(true),
            fail_exact: std::sync::atomic::AtomicBool::new(false),
            fail_inexact: std::sync::atomic::AtomicBool::new(false),
            cancel_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn set_exact_allowed(&self, allowed: bool) {
        self.exact_allowed
            .store(allowed, std::sync::atomic::Ordering::SeqCst);
    }

    /// Makes `set_exact` fail with a non-permission error.
    pub fn set_fail_exact(&self, fail: bool) {
        self.fail_exact
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_fail_inexact(&self, fail: bool) {
        self.fail_inexact
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn registration(&self, token: i32) -> Option<MockRegistration> {
        self.registrations.lock().unwrap().get(&token).cloned()
    }

    #[must_use]
    pub fn registrations(&self) -> Vec<(i32, MockRegistration)> {
        let mut all: Vec<_> = self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .map(|(token, reg)| (*token, reg.clone()))
            .collect();
        all.sort_by_key(|(_, reg)| reg.fire_at_ms);
        all
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    #[must_use]
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Fires the timer with `token` as if its time had come.
    pub fn fire(&self, token: i32) -> Option<FiredAlarm> {
        self.registrations
            .lock()
            .unwrap()
            .remove(&token)
            .map(|reg| FiredAlarm {
                token,
                fire_at_ms: reg.fire_at_ms,
                exact: reg.exact,
                payload: reg.payload,
            })
    }

    fn record(&self, token: i32, fire_at_ms: i64, payload: AlarmPayload, exact: bool) {
        self.registrations.lock().unwrap().insert(
            token,
            MockRegistration {
                fire_at_ms,
                exact,
                payload,
            },
        );
    }
}

impl TimerService for MockTimerService {
    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn set_exact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError> {
        if !self.can_schedule_exact() {
            return Err(SchedulerError::ExactPermissionDenied);
        }
        if self.fail_exact.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SchedulerError::RegistrationFailed("Mock failure".into()));
        }
        self.record(token, fire_at_ms, payload, true);
        Ok(())
    }

    fn set_inexact(
        &self,
        token: i32,
        fire_at_ms: i64,
        payload: AlarmPayload,
    ) -> Result<(), SchedulerError> {
        if self.fail_inexact.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SchedulerError::RegistrationFailed("Mock failure".into()));
        }
        self.record(token, fire_at_ms, payload, false);
        Ok(())
    }

    fn cancel(&self, token: i32) -> bool {
        self.cancel_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.registrations.lock().unwrap().remove(&token).is_some()
    }

    fn is_pending(&self, token: i32) -> bool {
        self.registrations.lock().unwrap().contains_key(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::types::AlarmId;

    fn payload(id: &str) -> AlarmPayload {
        AlarmPayload::new(AlarmId::new(id), "", "Test")
    }

    // ------------------------------------------------------------------------
    // TokioTimerService Tests
    // ------------------------------------------------------------------------

    mod tokio_timer_tests {
        use super::*;

        #[tokio::test]
        async fn test_exact_timer_fires() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);

            service
                .set_exact(7, now_millis() + 100, payload("a1"))
                .unwrap();
            assert!(service.is_pending(7));

            let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timer should fire")
                .unwrap();
            assert_eq!(fired.token, 7);
            assert!(fired.exact);
            assert_eq!(fired.payload.alarm_id.as_str(), "a1");
        }

        #[tokio::test]
        async fn test_past_fire_time_fires_immediately() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);

            service
                .set_exact(1, now_millis() - 5_000, payload("late"))
                .unwrap();

            let fired = tokio::time::timeout(Duration::from_millis(500), rx.recv())
                .await
                .expect("timer should fire")
                .unwrap();
            assert_eq!(fired.payload.alarm_id.as_str(), "late");
        }

        #[tokio::test]
        async fn test_cancel_prevents_fire() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);

            service
                .set_exact(3, now_millis() + 1_000, payload("a1"))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert!(service.cancel(3));
            assert!(!service.is_pending(3));

            let result = tokio::time::timeout(Duration::from_millis(1_500), rx.recv()).await;
            assert!(result.is_err(), "cancelled timer must not fire");
        }

        #[tokio::test]
        async fn test_reregister_replaces_previous() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);

            service
                .set_exact(9, now_millis() + 100, payload("first"))
                .unwrap();
            service
                .set_exact(9, now_millis() + 200, payload("second"))
                .unwrap();

            let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(fired.payload.alarm_id.as_str(), "second");

            let extra = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
            assert!(extra.is_err());
        }

        #[tokio::test]
        async fn test_fired_handles_are_dropped_on_register() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);

            service
                .set_exact(1, now_millis() + 50, payload("a1"))
                .unwrap();
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            service
                .set_exact(2, now_millis() + 60_000, payload("b2"))
                .unwrap();
            let tasks = service.tasks.lock().unwrap();
            assert_eq!(tasks.len(), 1);
            assert!(tasks.contains_key(&2));
        }

        #[tokio::test]
        async fn test_exact_denied_when_not_allowed() {
            let (tx, _rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, false);

            assert!(!service.can_schedule_exact());
            let err = service
                .set_exact(1, now_millis() + 1_000, payload("a1"))
                .unwrap_err();
            assert!(err.is_permission_error());

            service
                .set_inexact(1, now_millis() + 1_000, payload("a1"))
                .unwrap();
            assert!(service.is_pending(1));
        }

        #[tokio::test]
        async fn test_cancel_unknown_token() {
            let (tx, _rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);
            assert!(!service.cancel(12345));
        }

        #[test]
        fn test_register_without_runtime_fails() {
            let (tx, _rx) = mpsc::unbounded_channel();
            let service = TokioTimerService::new(tx, true);
            let err = service
                .set_exact(1, now_millis() + 1_000, payload("a1"))
                .unwrap_err();
            assert!(matches!(err, SchedulerError::ServiceUnavailable(_)));
        }
    }

    // ------------------------------------------------------------------------
    // MockTimerService Tests
    // ------------------------------------------------------------------------

    mod mock_timer_tests {
        use super::*;

        #[test]
        fn test_records_and_fires() {
            let service = MockTimerService::new();
            service.set_exact(5, 1_000, payload("a1")).unwrap();

            assert!(service.is_pending(5));
            let fired = service.fire(5).unwrap();
            assert_eq!(fired.fire_at_ms, 1_000);
            assert!(!service.is_pending(5));
            assert!(service.fire(5).is_none());
        }

        #[test]
        fn test_failure_switches() {
            let service = MockTimerService::new();
            service.set_fail_exact(true);
            assert!(!service
                .set_exact(1, 0, payload("a"))
                .unwrap_err()
                .is_permission_error());

            service.set_fail_inexact(true);
            assert!(service.set_inexact(1, 0, payload("a")).is_err());
        }
    }
}
