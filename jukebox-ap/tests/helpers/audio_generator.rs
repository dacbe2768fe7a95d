//! Audio test file generation
//!
//! Writes small deterministic WAV files for the `file` source and the
//! symphonia-backed codec tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Generate a sine wave WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `duration_ms` - Duration in milliseconds
/// * `sample_rate` - Frames per second
/// * `channels` - Same signal is written to every channel
/// * `frequency_hz` - Tone frequency
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    sample_rate: u32,
    channels: u16,
    frequency_hz: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let amplitude = i16::MAX as f32 * 0.5;

    for frame_idx in 0..total_frames {
        let t = frame_idx as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * frequency_hz * t).sin() * amplitude) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a 440 Hz stereo WAV at the standard test rate
pub fn generate_tone<P: AsRef<Path>>(path: P, duration_ms: u64) -> Result<(), hound::Error> {
    generate_sine_wav(path, duration_ms, TEST_SAMPLE_RATE, 2, 440.0)
}

/// Expected interleaved sample count of a file written by [`generate_sine_wav`]
pub fn expected_samples(duration_ms: u64, sample_rate: u32, channels: u16) -> usize {
    ((sample_rate as u64 * duration_ms) / 1000) as usize * channels as usize
}
