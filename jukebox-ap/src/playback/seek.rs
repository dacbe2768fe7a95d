//! Streaming/seek buffer
//!
//! Wraps a [`Song`] and hands out fixed-size chunks. Whatever the decoder
//! produces beyond the requested size is held back and served first on the
//! next read, so no sample is dropped or reordered.

use crate::codec::Song;
use crate::error::{Error, Result};
use jukebox_common::time::samples_to_duration;
use jukebox_common::SongInfo;
use std::time::Duration;

/// Result of one [`SeekBuffer::read`]
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub samples: Vec<f32>,
    /// The song has no more audio after `samples`
    pub end_of_stream: bool,
}

/// Per-song cursor: the open song plus its position bookkeeping
pub struct SeekBuffer {
    song: Box<dyn Song>,
    sample_rate: u32,
    channels: u16,
    duration: Option<Duration>,
    pending: Vec<f32>,
    /// Position of the last seek (zero at start)
    base: Duration,
    /// Samples emitted since `base`
    emitted: u64,
    ended: bool,
}

impl SeekBuffer {
    /// Wrap an initialised song
    pub fn new(song: Box<dyn Song>, sample_rate: u32, channels: u16) -> Self {
        let duration = song.info().duration();
        Self {
            song,
            sample_rate,
            channels,
            duration,
            pending: Vec::new(),
            base: Duration::ZERO,
            emitted: 0,
            ended: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Known duration of the song, if any
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn info(&self) -> SongInfo {
        self.song.info()
    }

    /// Read up to `n` interleaved samples
    ///
    /// Fewer than `n` samples are returned only at end of stream, which is
    /// flagged in the outcome rather than reported as an error.
    pub fn read(&mut self, n: usize) -> Result<ReadOutcome> {
        let from_pending = n.min(self.pending.len());
        let mut samples: Vec<f32> = self.pending.drain(..from_pending).collect();

        while samples.len() < n && !self.ended {
            let need = n - samples.len();
            let chunk = self.song.play(need)?;
            if chunk.is_empty() {
                self.ended = true;
                break;
            }
            if chunk.len() > need {
                samples.extend_from_slice(&chunk[..need]);
                self.pending.extend_from_slice(&chunk[need..]);
            } else {
                samples.extend(chunk);
            }
        }

        self.emitted += samples.len() as u64;
        Ok(ReadOutcome {
            samples,
            end_of_stream: self.ended && self.pending.is_empty(),
        })
    }

    /// Elapsed playback time
    ///
    /// Non-decreasing between seeks.
    pub fn position(&self) -> Duration {
        self.base + samples_to_duration(self.emitted, self.sample_rate, self.channels)
    }

    /// Move to `target`, clamped to the song's duration
    ///
    /// Fails with [`Error::SeekUnsupported`] for songs of unknown length.
    pub fn seek(&mut self, target: Duration) -> Result<()> {
        let duration = match self.duration {
            Some(d) if !d.is_zero() => d,
            _ => {
                return Err(Error::SeekUnsupported(
                    "song has no known duration".to_string(),
                ))
            }
        };
        let target = target.min(duration);

        self.song.seek(target)?;
        self.pending.clear();
        self.base = target;
        self.emitted = 0;
        self.ended = false;
        Ok(())
    }

    /// Release decoder resources
    pub fn close(&mut self) {
        self.pending.clear();
        self.song.close();
    }
}

impl Drop for SeekBuffer {
    fn drop(&mut self) {
        self.song.close();
    }
}
