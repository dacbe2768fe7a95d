//! Decodable song handle

use crate::error::Result;
use jukebox_common::SongInfo;
use std::time::Duration;

/// An opened, not yet fully read track
///
/// Owned by the playback engine while it plays and released with `close()`
/// on song change, stop or error.
pub trait Song: Send {
    /// Open the underlying stream and negotiate the output format
    ///
    /// Returns `(sample_rate, channels)`.
    fn init(&mut self) -> Result<(u32, u16)>;

    /// Decode roughly `n` interleaved samples
    ///
    /// May return more than `n` (whole decoder packets) or fewer. An empty
    /// vector means the stream ended normally.
    fn play(&mut self, n: usize) -> Result<Vec<f32>>;

    /// Reposition the decoder
    fn seek(&mut self, to: Duration) -> Result<()>;

    /// Descriptive metadata
    fn info(&self) -> SongInfo;

    /// Release decoder resources; `init()` may be called again afterwards
    fn close(&mut self);
}
