//! Cloneable handle to the playback actor
//!
//! Every method submits one [`Command`]; methods with a reply wait for the
//! actor to process it. Read-only queries go straight to [`SharedState`].

use super::commands::Command;
use super::actor::{EngineActor, EngineParts};
use crate::error::{Error, Result};
use crate::playback::broadcast::{AudioChunk, ListenerId, Observer, ObserverId};
use crate::playback::queue::QueueChange;
use crate::source::SourceRegistry;
use crate::state::SharedState;
use jukebox_common::StatusSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Handle used by the HTTP layer and `main`
#[derive(Clone)]
pub struct PlaybackEngine {
    tx: mpsc::Sender<Command>,
    state: Arc<SharedState>,
    registry: Arc<SourceRegistry>,
}

impl PlaybackEngine {
    /// Start the actor task
    pub fn spawn(parts: EngineParts) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(parts.settings.command_capacity.max(1));
        let state = Arc::new(SharedState::new());
        let registry = Arc::clone(&parts.registry);

        let actor = EngineActor::new(parts, Arc::clone(&state), tx.downgrade());
        let task = tokio::spawn(actor.run(rx));

        (Self { tx, state, registry }, task)
    }

    /// Snapshots published by the actor
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Source kinds that can be added
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::EngineUnavailable)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| Error::EngineUnavailable)
    }

    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(Command::Next).await
    }

    pub async fn prev(&self) -> Result<()> {
        self.send(Command::Prev).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn toggle_random(&self) -> Result<()> {
        self.send(Command::ToggleRandom).await
    }

    pub async fn toggle_repeat(&self) -> Result<()> {
        self.send(Command::ToggleRepeat).await
    }

    pub async fn play_index(&self, index: usize) -> Result<()> {
        self.send(Command::PlayIndex(index)).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::Seek { position, reply }).await?
    }

    /// Edit the queue; returns per-item error notes
    pub async fn change_queue(&self, change: QueueChange) -> Result<Vec<String>> {
        self.request(|reply| Command::QueueChange { change, reply })
            .await
    }

    pub async fn change_playlist(&self, name: String, change: QueueChange) -> Result<Vec<String>> {
        if name.is_empty() {
            return Err(Error::BadRequest("playlist name is empty".to_string()));
        }
        self.request(|reply| Command::PlaylistChange { name, change, reply })
            .await
    }

    /// Add a source instance; returns its key
    pub async fn add_source(&self, kind: String, params: Vec<String>) -> Result<String> {
        self.request(|reply| Command::AddSource {
            kind,
            params,
            reply: Some(reply),
        })
        .await?
    }

    /// Add a source without waiting for the outcome
    pub async fn add_source_detached(&self, kind: String, params: Vec<String>) -> Result<()> {
        self.send(Command::AddSource {
            kind,
            params,
            reply: None,
        })
        .await
    }

    pub async fn remove_source(&self, kind: String, key: String) -> Result<()> {
        self.request(|reply| Command::RemoveSource { kind, key, reply })
            .await?
    }

    pub async fn refresh_source(&self, kind: String, key: String) -> Result<()> {
        self.request(|reply| Command::RefreshSource { kind, key, reply })
            .await?
    }

    pub async fn add_observer(&self, observer: Arc<dyn Observer>) -> Result<ObserverId> {
        self.request(|reply| Command::AddObserver { observer, reply })
            .await
    }

    pub async fn remove_observer(&self, id: ObserverId) -> Result<()> {
        self.send(Command::RemoveObserver(id)).await
    }

    pub async fn add_listener(&self, sender: mpsc::Sender<AudioChunk>) -> Result<ListenerId> {
        self.request(|reply| Command::AddListener { sender, reply })
            .await
    }

    pub async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.send(Command::RemoveListener(id)).await
    }

    /// Status after every previously submitted command has been processed
    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Save, release the output and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
