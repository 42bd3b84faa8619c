//! Alarm audio: reference resolution and looping playback.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  resolve   ┌──────────────────┐
//! │  AudioResolver   │──────────▶│  ResolvedAudio   │
//! └──────────────────┘            │  File | Bundled  │
//!                                 └────────┬─────────┘
//!                                          │ prepare(generation)
//!                                          ▼
//! ┌──────────────────┐  AudioEvent ┌──────────────────┐
//! │ Session manager  │◀────────────│   AudioBackend   │
//! │ (state machine)  │────────────▶│ (rodio thread)   │
//! └──────────────────┘  start/release└─────────────────┘
//! ```
//!
//! Preparation is asynchronous: the backend answers with
//! [`AudioEvent::Prepared`] or [`AudioEvent::Error`], tagged with the
//! generation number the session manager gave it, so answers for a session
//! that has since been stopped can be discarded.

mod embedded;
mod error;
mod player;
mod source;

use std::sync::{Arc, Mutex};

pub use embedded::{bundled_tone, bundled_tone_format, TONE_SAMPLE_RATE};
pub use error::SoundError;
pub use player::RodioAlarmPlayer;
pub use source::{AudioResolver, ResolvedAudio};

/// Result of an asynchronous preparation, reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// The source is decoded and ready to start.
    Prepared { generation: u64 },
    /// Preparation or playback failed.
    Error { generation: u64, message: String },
}

impl AudioEvent {
    /// Returns the generation this event belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Prepared { generation } | Self::Error { generation, .. } => *generation,
        }
    }
}

/// Trait for alarm audio backends.
///
/// Implementations loop the prepared source at full volume until released.
pub trait AudioBackend: Send + Sync {
    /// Begins preparing `source`; the result arrives as an [`AudioEvent`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be submitted.
    fn prepare(&self, generation: u64, source: &ResolvedAudio) -> Result<(), SoundError>;

    /// Starts looping playback of the source prepared for `generation`.
    fn start(&self, generation: u64) -> Result<(), SoundError>;

    /// Stops playback and releases the player.
    fn release(&self);
}

impl<T: AudioBackend + ?Sized> AudioBackend for Arc<T> {
    fn prepare(&self, generation: u64, source: &ResolvedAudio) -> Result<(), SoundError> {
        (**self).prepare(generation, source)
    }

    fn start(&self, generation: u64) -> Result<(), SoundError> {
        (**self).start(generation)
    }

    fn release(&self) {
        (**self).release()
    }
}

/// A call recorded by [`MockAudioBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCall {
    Prepare {
        generation: u64,
        source: ResolvedAudio,
    },
    Start {
        generation: u64,
    },
    Release,
}

/// Mock audio backend for testing.
///
/// Records every call; tests drive preparation results by feeding
/// [`AudioEvent`]s to the session manager themselves.
#[derive(Debug, Default)]
pub struct MockAudioBackend {
    calls: Mutex<Vec<AudioCall>>,
    should_fail: std::sync::atomic::AtomicBool,
}

impl MockAudioBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `prepare` and `start` fail immediately.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail
            .store(should_fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the generation and source of the most recent `prepare`.
    #[must_use]
    pub fn last_prepare(&self) -> Option<(u64, ResolvedAudio)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            AudioCall::Prepare { generation, source } => Some((generation, source)),
            _ => None,
        })
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, AudioCall::Release))
            .count()
    }

    #[must_use]
    pub fn start_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, AudioCall::Start { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn fail_if_requested(&self) -> Result<(), SoundError> {
        if self.should_fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SoundError::PlaybackError("Mock failure".to_string()));
        }
        Ok(())
    }
}

impl AudioBackend for MockAudioBackend {
    fn prepare(&self, generation: u64, source: &ResolvedAudio) -> Result<(), SoundError> {
        self.calls.lock().unwrap().push(AudioCall::Prepare {
            generation,
            source: source.clone(),
        });
        self.fail_if_requested()
    }

    fn start(&self, generation: u64) -> Result<(), SoundError> {
        self.calls
            .lock()
            .unwrap()
            .push(AudioCall::Start { generation });
        self.fail_if_requested()
    }

    fn release(&self) {
        self.calls.lock().unwrap().push(AudioCall::Release);
    }
}
