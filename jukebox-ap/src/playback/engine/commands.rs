//! Messages accepted by the playback actor

use crate::error::Result;
use crate::playback::broadcast::{AudioChunk, ListenerId, Observer, ObserverId};
use crate::playback::queue::QueueChange;
use crate::source::Catalog;
use jukebox_common::StatusSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Command processed by the playback actor, one at a time, in order
pub enum Command {
    Play,
    Stop,
    Next,
    Prev,
    Pause,
    ToggleRandom,
    ToggleRepeat,
    /// Stop, jump to the given queue index, play
    PlayIndex(usize),
    Seek {
        position: Duration,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Edit the live queue; replies with per-item error notes
    QueueChange {
        change: QueueChange,
        reply: oneshot::Sender<Vec<String>>,
    },
    PlaylistChange {
        name: String,
        change: QueueChange,
        reply: oneshot::Sender<Vec<String>>,
    },

    /// Create a source instance; replies with its key
    AddSource {
        kind: String,
        params: Vec<String>,
        reply: Option<oneshot::Sender<Result<String>>>,
    },
    RemoveSource {
        kind: String,
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RefreshSource {
        kind: String,
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Background catalog fetch finished
    SourceListed {
        kind: String,
        key: String,
        result: Result<Catalog>,
    },

    AddObserver {
        observer: Arc<dyn Observer>,
        reply: oneshot::Sender<ObserverId>,
    },
    RemoveObserver(ObserverId),
    AddListener {
        sender: mpsc::Sender<AudioChunk>,
        reply: oneshot::Sender<ListenerId>,
    },
    RemoveListener(ListenerId),

    /// Current status, computed after every earlier command
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    /// Debounced persistence target
    Save,
    /// A background save failed with this message
    SaveFailed(String),
    /// Final save, release the output, exit
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play => "Play",
            Command::Stop => "Stop",
            Command::Next => "Next",
            Command::Prev => "Prev",
            Command::Pause => "Pause",
            Command::ToggleRandom => "ToggleRandom",
            Command::ToggleRepeat => "ToggleRepeat",
            Command::PlayIndex(_) => "PlayIndex",
            Command::Seek { .. } => "Seek",
            Command::QueueChange { .. } => "QueueChange",
            Command::PlaylistChange { .. } => "PlaylistChange",
            Command::AddSource { .. } => "AddSource",
            Command::RemoveSource { .. } => "RemoveSource",
            Command::RefreshSource { .. } => "RefreshSource",
            Command::SourceListed { .. } => "SourceListed",
            Command::AddObserver { .. } => "AddObserver",
            Command::RemoveObserver(_) => "RemoveObserver",
            Command::AddListener { .. } => "AddListener",
            Command::RemoveListener(_) => "RemoveListener",
            Command::Status { .. } => "Status",
            Command::Save => "Save",
            Command::SaveFailed(_) => "SaveFailed",
            Command::Shutdown { .. } => "Shutdown",
        }
    }

    /// Whether the command can change playback or persisted state
    ///
    /// Such commands are followed by a status broadcast and a debounced save.
    pub fn mutates_state(&self) -> bool {
        !matches!(
            self,
            Command::Status { .. }
                | Command::Save
                | Command::SaveFailed(_)
                | Command::Shutdown { .. }
                | Command::AddObserver { .. }
                | Command::RemoveObserver(_)
                | Command::AddListener { .. }
                | Command::RemoveListener(_)
        )
    }
}
