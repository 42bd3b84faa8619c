//! Vibration output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Waveform of a ringing alarm in milliseconds: initial delay, then
/// alternating on/off durations.
pub const VIBRATION_PATTERN: [u64; 6] = [0, 500, 200, 500, 200, 500];

/// Index the waveform repeats from.
pub const VIBRATION_REPEAT_FROM: usize = 0;

/// Trait for vibration hardware.
pub trait Vibrator: Send + Sync {
    /// Starts `pattern`, repeating from `repeat_from` until cancelled.
    ///
    /// Returns false if the device cannot vibrate.
    fn vibrate(&self, pattern: &[u64], repeat_from: Option<usize>) -> bool;

    /// Cancels any ongoing vibration.
    fn cancel(&self);
}

impl<T: Vibrator + ?Sized> Vibrator for std::sync::Arc<T> {
    fn vibrate(&self, pattern: &[u64], repeat_from: Option<usize>) -> bool {
        (**self).vibrate(pattern, repeat_from)
    }

    fn cancel(&self) {
        (**self).cancel()
    }
}

/// Vibrator for hosts without vibration hardware.
///
/// Records the requested waveform in the log so the session's behavior
/// stays observable.
#[derive(Debug, Default)]
pub struct LogVibrator {
    active: AtomicBool,
}

impl LogVibrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Vibrator for LogVibrator {
    fn vibrate(&self, pattern: &[u64], repeat_from: Option<usize>) -> bool {
        self.active.store(true, Ordering::SeqCst);
        tracing::debug!(?pattern, ?repeat_from, "vibration started (no hardware)");
        false
    }

    fn cancel(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::debug!("vibration cancelled");
        }
    }
}

/// Mock vibrator for testing.
#[derive(Debug, Default)]
pub struct MockVibrator {
    pattern: Mutex<Option<(Vec<u64>, Option<usize>)>>,
    cancel_count: std::sync::atomic::AtomicUsize,
}

impl MockVibrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the waveform currently playing, if any.
    #[must_use]
    pub fn active_pattern(&self) -> Option<(Vec<u64>, Option<usize>)> {
        self.pattern.lock().unwrap().clone()
    }

    #[must_use]
    pub fn is_vibrating(&self) -> bool {
        self.pattern.lock().unwrap().is_some()
    }

    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }
}

impl Vibrator for MockVibrator {
    fn vibrate(&self, pattern: &[u64], repeat_from: Option<usize>) -> bool {
        *self.pattern.lock().unwrap() = Some((pattern.to_vec(), repeat_from));
        true
    }

    fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        *self.pattern.lock().unwrap() = None;
    }
}
