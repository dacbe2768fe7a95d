//! Playback-related type definitions
//!
//! Transport state and the status snapshot pushed to observers.

use crate::song::{SongId, SongInfo};
use serde::{Deserialize, Serialize};

/// Transport state of the playback engine
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No song held; elapsed is zero
    #[default]
    Stopped,
    /// Song is being pulled and pushed to the output
    Playing,
    /// Song held, no audio produced
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Point-in-time view of the engine, broadcast on every state change
/// and at a throttled rate while playing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: PlaybackState,
    /// Song at the queue index, if any
    pub song: Option<SongId>,
    /// Metadata of `song`, when its source knows it
    pub info: Option<SongInfo>,
    pub index: usize,
    pub elapsed_ms: u64,
    /// Zero when unknown
    pub duration_ms: u64,
    pub random: bool,
    pub repeat: bool,
    pub queue_len: usize,
}
