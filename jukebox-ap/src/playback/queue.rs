//! Queue and playlist management
//!
//! The live queue and the named playlists share one mutation algorithm,
//! [`apply_change`]: removals then additions, with duplicates collapsed so a
//! song appears at most once, at its first insertion position.

use jukebox_common::{PersistedState, Playlist, PlaylistSet, SongId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Requested mutation of a queue or playlist
///
/// Ids arrive in wire form and are parsed here so one bad id does not
/// reject the whole request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueChange {
    pub clear: bool,
    pub remove: Vec<String>,
    pub add: Vec<String>,
}

/// Result of [`apply_change`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeOutcome {
    pub list: Playlist,
    /// The list was cleared or ended up empty
    pub cleared: bool,
    /// One note per rejected id; the mutation itself still applies
    pub errors: Vec<String>,
}

/// Compute a new list from `current` and `change`
///
/// `clear` is honoured only when `allow_clear` is set. Removing an id that is
/// not present records an "unknown id" note; malformed ids record a "bad id"
/// note. Adding is permissive: any well-formed id not yet present is appended.
pub fn apply_change(current: &[SongId], change: &QueueChange, allow_clear: bool) -> ChangeOutcome {
    let mut errors = Vec::new();

    let clearing = change.clear && allow_clear;
    let mut list: Vec<SongId> = Vec::with_capacity(current.len() + change.add.len());
    if !clearing {
        let mut seen = HashSet::new();
        for id in current {
            if seen.insert(id) {
                list.push(id.clone());
            }
        }
    }

    for raw in &change.remove {
        match raw.parse::<SongId>() {
            Ok(id) => {
                let before = list.len();
                list.retain(|existing| *existing != id);
                if list.len() == before {
                    errors.push(format!("unknown id: {}", raw));
                }
            }
            Err(_) => errors.push(format!("bad id: {}", raw)),
        }
    }

    for raw in &change.add {
        match raw.parse::<SongId>() {
            Ok(id) => {
                if !list.contains(&id) {
                    list.push(id);
                }
            }
            Err(_) => errors.push(format!("bad id: {}", raw)),
        }
    }

    let cleared = clearing || list.is_empty();
    ChangeOutcome {
        list,
        cleared,
        errors,
    }
}

/// Queue, position and named playlists owned by the playback actor
#[derive(Debug, Clone, Default)]
pub struct QueueManager {
    queue: Playlist,
    index: usize,
    playlists: PlaylistSet,
    random: bool,
    repeat: bool,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a persisted snapshot; the index always starts at 0
    pub fn from_persisted(state: &PersistedState) -> Self {
        Self {
            queue: state.queue.clone(),
            index: 0,
            playlists: state.playlists.clone(),
            random: state.random,
            repeat: state.repeat,
        }
    }

    /// Copy queue state into a snapshot
    pub fn persist_into(&self, state: &mut PersistedState) {
        state.queue = self.queue.clone();
        state.playlists = self.playlists.clone();
        state.random = self.random;
        state.repeat = self.repeat;
    }

    pub fn queue(&self) -> &Playlist {
        &self.queue
    }

    pub fn playlists(&self) -> &PlaylistSet {
        &self.playlists
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn random(&self) -> bool {
        self.random
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn toggle_random(&mut self) -> bool {
        self.random = !self.random;
        self.random
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Song at the current index, if the index is inside the queue
    pub fn current(&self) -> Option<&SongId> {
        self.queue.get(self.index)
    }

    /// Move past the current song
    ///
    /// With random enabled and more than one entry, picks a uniformly random
    /// index different from the current one; otherwise steps forward.
    pub fn advance<R: Rng>(&mut self, rng: &mut R) {
        let len = self.queue.len();
        if self.random && len > 1 {
            let current = self.index.min(len - 1);
            let pick = rng.gen_range(0..len - 1);
            self.index = if pick >= current { pick + 1 } else { pick };
        } else {
            self.index += 1;
        }
    }

    /// Move past a song that failed to play
    ///
    /// Like [`advance`](Self::advance), but a random pick is drawn only from
    /// indices not in `tried`. Returns `false` when random is on and every
    /// entry has been tried.
    pub fn advance_untried<R: Rng>(&mut self, rng: &mut R, tried: &HashSet<usize>) -> bool {
        if !self.random || self.queue.len() <= 1 {
            self.advance(rng);
            return true;
        }
        let untried: Vec<usize> = (0..self.queue.len()).filter(|i| !tried.contains(i)).collect();
        if untried.is_empty() {
            return false;
        }
        self.index = untried[rng.gen_range(0..untried.len())];
        true
    }

    /// Step back for "previous"
    ///
    /// Goes back one song, or two when less than `threshold` of the current
    /// song has played. Never goes below zero.
    pub fn rewind(&mut self, elapsed: Duration, threshold: Duration) {
        let steps = if elapsed < threshold { 2 } else { 1 };
        self.index = self.index.saturating_sub(steps);
    }

    /// Normalise the index before resolving a song
    ///
    /// Returns `false` when the queue is exhausted: the index wraps to 0 under
    /// repeat, otherwise it is reset to 0 and playback should stop.
    pub fn wrap(&mut self) -> bool {
        if self.queue.is_empty() {
            self.index = 0;
            return false;
        }
        if self.index >= self.queue.len() {
            self.index = 0;
            return self.repeat;
        }
        true
    }

    /// Apply a change to the live queue
    ///
    /// The index follows the song it pointed at when that song survives.
    pub fn change_queue(&mut self, change: &QueueChange) -> ChangeOutcome {
        let current = self.current().cloned();
        let outcome = apply_change(&self.queue, change, true);
        self.queue = outcome.list.clone();

        if outcome.cleared {
            self.index = 0;
        } else if let Some(pos) = current.and_then(|id| self.queue.iter().position(|s| *s == id)) {
            self.index = pos;
        } else {
            self.index = self.index.min(self.queue.len());
        }
        outcome
    }

    /// Apply a change to a named playlist; empty playlists are deleted
    ///
    /// `clear` is ignored: a playlist is emptied by removing its songs.
    pub fn change_playlist(&mut self, name: &str, change: &QueueChange) -> ChangeOutcome {
        let base = self.playlists.get(name).cloned().unwrap_or_default();
        let outcome = apply_change(&base, change, false);
        if outcome.list.is_empty() {
            self.playlists.remove(name);
        } else {
            self.playlists.insert(name.to_string(), outcome.list.clone());
        }
        outcome
    }

    /// Add a playlist published by a source unless the name is taken
    pub fn seed_playlist(&mut self, name: &str, songs: Playlist) -> bool {
        if songs.is_empty() || self.playlists.contains_key(name) {
            return false;
        }
        self.playlists.insert(name.to_string(), songs);
        true
    }
}
