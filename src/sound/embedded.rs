//! Bundled alarm tone.
//!
//! The tone is synthesized once into an in-memory WAV file: three short
//! 880 Hz beeps followed by a pause. Played with infinite repeat it forms
//! the default ringing pattern, and it is the fallback whenever a custom
//! sound cannot be resolved or decoded.

use std::f32::consts::PI;
use std::sync::OnceLock;

/// Sample rate of the bundled tone.
pub const TONE_SAMPLE_RATE: u32 = 22_050;

const TONE_FREQUENCY_HZ: f32 = 880.0;
const BEEP_MS: u32 = 150;
const GAP_MS: u32 = 100;
const PAUSE_MS: u32 = 450;
const BEEPS: u32 = 3;
const AMPLITUDE: f32 = 0.8;

static TONE: OnceLock<Vec<u8>> = OnceLock::new();

/// Returns the bundled alarm tone as WAV bytes.
#[must_use]
pub fn bundled_tone() -> &'static [u8] {
    TONE.get_or_init(synthesize)
}

/// Returns the format description of the bundled tone.
#[must_use]
pub const fn bundled_tone_format() -> &'static str {
    "WAV (16-bit PCM, 22.05kHz, Mono)"
}

fn samples_for(ms: u32) -> u32 {
    TONE_SAMPLE_RATE * ms / 1000
}

fn synthesize() -> Vec<u8> {
    let mut samples: Vec<i16> = Vec::new();

    for _ in 0..BEEPS {
        let beep = samples_for(BEEP_MS);
        // Short linear fade at both ends to avoid clicks.
        let fade = samples_for(10).max(1);
        for n in 0..beep {
            let t = n as f32 / TONE_SAMPLE_RATE as f32;
            let envelope = (n.min(beep - n) as f32 / fade as f32).min(1.0);
            let value = (2.0 * PI * TONE_FREQUENCY_HZ * t).sin() * AMPLITUDE * envelope;
            samples.push((value * f32::from(i16::MAX)) as i16);
        }
        samples.extend(std::iter::repeat(0).take(samples_for(GAP_MS) as usize));
    }
    samples.extend(std::iter::repeat(0).take(samples_for(PAUSE_MS) as usize));

    encode_wav(&samples)
}

fn encode_wav(samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = TONE_SAMPLE_RATE * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&TONE_SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_riff_wave_header() {
        let data = bundled_tone();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");
        assert_eq!(&data[12..16], b"fmt ");
        assert_eq!(&data[36..40], b"data");
    }

    #[test]
    fn test_sizes_are_consistent() {
        let data = bundled_tone();
        let riff_len = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        let data_len = u32::from_le_bytes(data[40..44].try_into().unwrap()) as usize;

        assert_eq!(riff_len + 8, data.len());
        assert_eq!(data_len + 44, data.len());
    }

    #[test]
    fn test_tone_is_not_silent() {
        let data = bundled_tone();
        let loudest = data[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]).unsigned_abs())
            .max()
            .unwrap();
        assert!(loudest > 10_000);
    }

    #[test]
    fn test_returns_same_buffer() {
        assert!(std::ptr::eq(bundled_tone(), bundled_tone()));
    }

    #[test]
    fn test_format_description() {
        assert!(bundled_tone_format().contains("PCM"));
    }
}
