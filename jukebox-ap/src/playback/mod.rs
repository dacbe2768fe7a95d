//! Playback engine and its building blocks

pub mod broadcast;
pub mod engine;
pub mod queue;
pub mod seek;

pub use broadcast::{ChannelObserver, Observer};
pub use engine::{EngineParts, PlaybackEngine};
pub use queue::{QueueChange, QueueManager};
pub use seek::SeekBuffer;
