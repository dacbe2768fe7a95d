//! Shared type definitions for event data

use serde::{Deserialize, Serialize};

use crate::song::{SongId, SongInfo};

/// One entry of the aggregated track listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub id: SongId,
    pub info: SongInfo,
}
