//! Song identity and descriptive metadata
//!
//! A [`SongId`] names one track inside one source instance. Its wire form is
//! `"<source>|<instance key>|<track id>"`; the first two parts may not contain
//! the delimiter, the track id may (everything after the second `|` belongs to
//! it), so parsing and formatting round-trip exactly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Separator used in the wire form of a [`SongId`]
pub const SONG_ID_DELIMITER: char = '|';

/// Composite key identifying a track within a specific source instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SongId {
    /// Source kind name (e.g. "file")
    pub source: String,
    /// Unique key of the source instance (e.g. the scanned directory)
    pub key: String,
    /// Track identifier inside the instance
    pub track: String,
}

impl SongId {
    /// Build a validated song id
    pub fn new(
        source: impl Into<String>,
        key: impl Into<String>,
        track: impl Into<String>,
    ) -> Result<Self> {
        let id = Self {
            source: source.into(),
            key: key.into(),
            track: track.into(),
        };
        id.validate()?;
        Ok(id)
    }

    fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Err(Error::InvalidInput("song id has an empty source".to_string()));
        }
        if self.track.is_empty() {
            return Err(Error::InvalidInput("song id has an empty track".to_string()));
        }
        if self.source.contains(SONG_ID_DELIMITER) || self.key.contains(SONG_ID_DELIMITER) {
            return Err(Error::InvalidInput(format!(
                "source and key may not contain '{}': {}|{}",
                SONG_ID_DELIMITER, self.source, self.key
            )));
        }
        Ok(())
    }

    /// Whether this song belongs to the given source instance
    pub fn belongs_to(&self, source: &str, key: &str) -> bool {
        self.source == source && self.key == key
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.source, SONG_ID_DELIMITER, self.key, SONG_ID_DELIMITER, self.track
        )
    }
}

impl FromStr for SongId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, SONG_ID_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(key), Some(track)) => Self::new(source, key, track),
            _ => Err(Error::InvalidInput(format!("bad song id: {}", s))),
        }
    }
}

impl TryFrom<String> for SongId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SongId> for String {
    fn from(id: SongId) -> Self {
        id.to_string()
    }
}

/// Descriptive metadata for a track
///
/// Refreshed by the owning source; never mutated by the playback engine.
/// Zero `track`/`duration_ms` mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track: u32,
    pub duration_ms: u64,
}

impl SongInfo {
    /// Known duration, if any
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_ms > 0).then(|| Duration::from_millis(self.duration_ms))
    }
}

/// Ordered list of songs (the live queue or a named playlist)
pub type Playlist = Vec<SongId>;

/// Named playlists, ordered by name for stable snapshots
pub type PlaylistSet = BTreeMap<String, Playlist>;
