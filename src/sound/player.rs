//! Looping alarm player using rodio.
//!
//! `rodio::OutputStream` must stay on the thread that created it, so the
//! player owns a dedicated audio thread. Commands go in over a channel;
//! preparation results come back as [`AudioEvent`]s tagged with the
//! generation they belong to.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::embedded::bundled_tone;
use super::error::SoundError;
use super::source::ResolvedAudio;
use super::{AudioBackend, AudioEvent};

/// Playback volume of a ringing alarm.
const ALARM_VOLUME: f32 = 1.0;

enum Command {
    Prepare {
        generation: u64,
        source: ResolvedAudio,
    },
    Start {
        generation: u64,
    },
    Release,
    Shutdown,
}

/// A decoded source waiting for `start`.
enum Prepared {
    File(Decoder<BufReader<File>>),
    Bundled(Decoder<Cursor<&'static [u8]>>),
}

/// Alarm player backed by a dedicated rodio thread.
///
/// Sources loop until released and play at full volume on the default
/// output device.
pub struct RodioAlarmPlayer {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl RodioAlarmPlayer {
    /// Starts the audio thread.
    ///
    /// Opening the output device happens on the audio thread; if no device
    /// is available every `prepare` reports an [`AudioEvent::Error`].
    ///
    /// # Errors
    ///
    /// Returns an error if the audio thread cannot be spawned.
    pub fn spawn(events: UnboundedSender<AudioEvent>) -> Result<Self, SoundError> {
        let (commands, receiver) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("wakeup-audio".to_string())
            .spawn(move || run_audio_thread(receiver, events))
            .map_err(|e| SoundError::DeviceNotAvailable(e.to_string()))?;

        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }

    fn send(&self, command: Command) -> Result<(), SoundError> {
        self.commands
            .send(command)
            .map_err(|_| SoundError::PlaybackError("audio thread has stopped".to_string()))
    }
}

impl AudioBackend for RodioAlarmPlayer {
    fn prepare(&self, generation: u64, source: &ResolvedAudio) -> Result<(), SoundError> {
        self.send(Command::Prepare {
            generation,
            source: source.clone(),
        })
    }

    fn start(&self, generation: u64) -> Result<(), SoundError> {
        self.send(Command::Start { generation })
    }

    fn release(&self) {
        let _ = self.send(Command::Release);
    }
}

impl Drop for RodioAlarmPlayer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for RodioAlarmPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioAlarmPlayer")
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Audio thread
// ============================================================================

fn run_audio_thread(commands: Receiver<Command>, events: UnboundedSender<AudioEvent>) {
    let output = match OutputStream::try_default() {
        Ok(pair) => {
            debug!("Audio output stream initialized");
            Some(pair)
        }
        Err(e) => {
            warn!("オーディオ出力を開けません: {}", e);
            None
        }
    };

    let mut prepared: Option<(u64, Prepared)> = None;
    let mut sink: Option<Sink> = None;

    while let Ok(command) = commands.recv() {
        match command {
            Command::Prepare { generation, source } => {
                stop_sink(&mut sink);
                prepared = None;

                let result = match &output {
                    Some(_) => decode(&source),
                    None => Err(SoundError::DeviceNotAvailable(
                        "no default output device".to_string(),
                    )),
                };

                let event = match result {
                    Ok(decoded) => {
                        prepared = Some((generation, decoded));
                        AudioEvent::Prepared { generation }
                    }
                    Err(e) => AudioEvent::Error {
                        generation,
                        message: e.to_string(),
                    },
                };
                let _ = events.send(event);
            }
            Command::Start { generation } => {
                let Some((_, handle)) = &output else {
                    continue;
                };
                match prepared.take() {
                    Some((prepared_generation, decoded)) if prepared_generation == generation => {
                        match play_looping(handle, decoded) {
                            Ok(new_sink) => {
                                stop_sink(&mut sink);
                                sink = Some(new_sink);
                                debug!(generation, "alarm playback started");
                            }
                            Err(e) => {
                                let _ = events.send(AudioEvent::Error {
                                    generation,
                                    message: e.to_string(),
                                });
                            }
                        }
                    }
                    other => {
                        debug!(generation, "start ignored: source not prepared for this generation");
                        prepared = other;
                    }
                }
            }
            Command::Release => {
                stop_sink(&mut sink);
                prepared = None;
            }
            Command::Shutdown => break,
        }
    }

    stop_sink(&mut sink);
    debug!("Audio thread stopped");
}

fn decode(source: &ResolvedAudio) -> Result<Prepared, SoundError> {
    match source {
        ResolvedAudio::File(path) => {
            let file = File::open(path)
                .map_err(|e| SoundError::FileNotFound(format!("{}: {}", path.display(), e)))?;
            let decoder = Decoder::new(BufReader::new(file))
                .map_err(|e| SoundError::DecodeError(e.to_string()))?;
            Ok(Prepared::File(decoder))
        }
        ResolvedAudio::Bundled => {
            let decoder = Decoder::new(Cursor::new(bundled_tone()))
                .map_err(|e| SoundError::DecodeError(format!("bundled tone: {}", e)))?;
            Ok(Prepared::Bundled(decoder))
        }
    }
}

fn play_looping(handle: &OutputStreamHandle, decoded: Prepared) -> Result<Sink, SoundError> {
    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;
    sink.set_volume(ALARM_VOLUME);

    match decoded {
        Prepared::File(decoder) => sink.append(decoder.repeat_infinite()),
        Prepared::Bundled(decoder) => sink.append(decoder.repeat_infinite()),
    }
    sink.play();
    Ok(sink)
}

fn stop_sink(sink: &mut Option<Sink>) {
    if let Some(active) = sink.take() {
        active.stop();
    }
}
