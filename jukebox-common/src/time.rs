//! Timestamp and sample-clock utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Convert a duration to whole milliseconds, saturating at `u64::MAX`
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Playback time covered by `samples` interleaved samples
///
/// Returns zero for a degenerate format (no rate or no channels).
pub fn samples_to_duration(samples: u64, sample_rate: u32, channels: u16) -> Duration {
    let per_second = sample_rate as u64 * channels as u64;
    if per_second == 0 {
        return Duration::ZERO;
    }
    let secs = samples / per_second;
    let rem = samples % per_second;
    Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / per_second)
}

/// Number of interleaved samples covering `duration`, rounded down to a whole frame
pub fn duration_to_samples(duration: Duration, sample_rate: u32, channels: u16) -> u64 {
    let frames = (duration.as_nanos() * sample_rate as u128 / 1_000_000_000) as u64;
    frames * channels as u64
}
