//! # Jukebox Common Library
//!
//! Shared code for the jukebox service and its clients:
//! - Song identity and metadata (`SongId`, `SongInfo`)
//! - Event types pushed to observers (`JukeboxEvent`)
//! - Persisted state snapshot
//! - Bootstrap configuration loading
//! - Utility functions

pub mod config;
pub mod error;
pub mod events;
pub mod persisted;
pub mod song;
pub mod time;

pub use error::{Error, Result};
pub use events::{JukeboxEvent, PlaybackState, StatusSnapshot, TrackEntry};
pub use persisted::PersistedState;
pub use song::{Playlist, PlaylistSet, SongId, SongInfo};
