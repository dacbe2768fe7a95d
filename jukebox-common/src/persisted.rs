//! Durable state snapshot
//!
//! What survives a restart: the queue, named playlists, the random/repeat
//! flags and the parameters of every configured source instance. Runtime
//! state (current song, elapsed time, observers) is never persisted.

use crate::song::{Playlist, PlaylistSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Construction parameters of one source instance (e.g. `directory`)
pub type SourceParams = BTreeMap<String, String>;

/// Persisted jukebox state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub queue: Playlist,
    pub playlists: PlaylistSet,
    pub random: bool,
    pub repeat: bool,
    /// Source kind -> instance key -> construction parameters
    pub sources: BTreeMap<String, BTreeMap<String, SourceParams>>,
}

impl PersistedState {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
