//! Event types for the jukebox observer protocol
//!
//! Every message pushed to a connected observer (SSE or WebSocket) is a
//! [`JukeboxEvent`]. Events are tagged by `type` so clients can dispatch on a
//! single field.

mod playback_types;
mod shared_types;

pub use playback_types::{PlaybackState, StatusSnapshot};
pub use shared_types::TrackEntry;

use crate::song::{Playlist, PlaylistSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Jukebox event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JukeboxEvent {
    /// Transport status (state, current song, position)
    Status {
        status: StatusSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue or any named playlist changed
    QueueChanged {
        queue: Playlist,
        playlists: PlaylistSet,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Source instances added or removed
    ///
    /// Maps each source kind to the keys of its live instances.
    SourcesChanged {
        sources: BTreeMap<String, Vec<String>>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Aggregated track listing changed
    TracksChanged {
        tracks: Vec<TrackEntry>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Non-fatal error worth surfacing to clients
    Error {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl JukeboxEvent {
    pub fn status(status: StatusSnapshot) -> Self {
        JukeboxEvent::Status {
            status,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn queue_changed(queue: Playlist, playlists: PlaylistSet) -> Self {
        JukeboxEvent::QueueChanged {
            queue,
            playlists,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn sources_changed(sources: BTreeMap<String, Vec<String>>) -> Self {
        JukeboxEvent::SourcesChanged {
            sources,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn tracks_changed(tracks: Vec<TrackEntry>) -> Self {
        JukeboxEvent::TracksChanged {
            tracks,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        JukeboxEvent::Error {
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event type name, used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            JukeboxEvent::Status { .. } => "Status",
            JukeboxEvent::QueueChanged { .. } => "QueueChanged",
            JukeboxEvent::SourcesChanged { .. } => "SourcesChanged",
            JukeboxEvent::TracksChanged { .. } => "TracksChanged",
            JukeboxEvent::Error { .. } => "Error",
        }
    }
}
