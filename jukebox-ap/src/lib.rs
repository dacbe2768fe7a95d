//! # Jukebox Audio Player Library (jukebox-ap)
//!
//! Networked jukebox playback engine.
//!
//! **Purpose:** Aggregate songs from configured sources, keep a play queue,
//! stream decoded audio to a local output device and push live status to
//! any number of connected observers.
//!
//! **Architecture:** a single playback actor owns all playback state and
//! consumes a serialized command channel; decoding via symphonia, output
//! via cpal, HTTP/SSE/WebSocket control via axum, state in SQLite.

pub mod api;
pub mod audio;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod source;
pub mod state;

pub use error::{Error, Result};
pub use playback::PlaybackEngine;
pub use state::SharedState;
