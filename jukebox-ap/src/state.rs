//! Shared read-side state
//!
//! The playback actor is the only writer. HTTP handlers read snapshots from
//! here instead of round-tripping through the command channel.

use jukebox_common::{Playlist, PlaylistSet, SongId, SongInfo, StatusSnapshot, TrackEntry};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Snapshots published by the playback actor
pub struct SharedState {
    /// Last published transport status
    pub status: RwLock<StatusSnapshot>,

    /// Live queue
    pub queue: RwLock<Playlist>,

    /// Named playlists (queue excluded)
    pub playlists: RwLock<PlaylistSet>,

    /// Source kind -> live instance keys
    pub sources: RwLock<BTreeMap<String, Vec<String>>>,

    /// Aggregated track listing across all sources
    pub tracks: RwLock<BTreeMap<SongId, SongInfo>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(StatusSnapshot::default()),
            queue: RwLock::new(Vec::new()),
            playlists: RwLock::new(PlaylistSet::new()),
            sources: RwLock::new(BTreeMap::new()),
            tracks: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn get_status(&self) -> StatusSnapshot {
        self.status.read().await.clone()
    }

    pub async fn set_status(&self, status: StatusSnapshot) {
        *self.status.write().await = status;
    }

    pub async fn get_queue(&self) -> Playlist {
        self.queue.read().await.clone()
    }

    pub async fn get_playlists(&self) -> PlaylistSet {
        self.playlists.read().await.clone()
    }

    /// Replace queue and playlists together
    pub async fn set_lists(&self, queue: Playlist, playlists: PlaylistSet) {
        *self.queue.write().await = queue;
        *self.playlists.write().await = playlists;
    }

    pub async fn get_sources(&self) -> BTreeMap<String, Vec<String>> {
        self.sources.read().await.clone()
    }

    pub async fn set_sources(&self, sources: BTreeMap<String, Vec<String>>) {
        *self.sources.write().await = sources;
    }

    /// Track listing in id order
    pub async fn get_tracks(&self) -> Vec<TrackEntry> {
        self.tracks
            .read()
            .await
            .iter()
            .map(|(id, info)| TrackEntry {
                id: id.clone(),
                info: info.clone(),
            })
            .collect()
    }

    pub async fn set_tracks(&self, tracks: BTreeMap<SongId, SongInfo>) {
        *self.tracks.write().await = tracks;
    }

    /// Metadata for one song, if any source lists it
    pub async fn song_info(&self, id: &SongId) -> Option<SongInfo> {
        self.tracks.read().await.get(id).cloned()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
