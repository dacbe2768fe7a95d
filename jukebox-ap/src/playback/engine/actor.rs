//! Playback actor - state, command loop and publication
//!
//! **Responsibilities:**
//! - Owns every piece of mutable playback state (queue, cursor, output,
//!   observer sets, source instances)
//! - Processes commands one at a time, in submission order
//! - Arms a tick timer while playing and disarms it otherwise
//! - Publishes snapshots to [`SharedState`] and observers
//! - Debounces persistence

use super::commands::Command;
use crate::audio::AudioOutput;
use crate::config::EngineSettings;
use crate::db::StateStore;
use crate::error::Error;
use crate::playback::broadcast::Broadcaster;
use crate::playback::queue::QueueManager;
use crate::playback::seek::SeekBuffer;
use crate::source::{Source, SourceRegistry};
use crate::state::SharedState;
use jukebox_common::persisted::SourceParams;
use jukebox_common::time::samples_to_duration;
use jukebox_common::{
    JukeboxEvent, PersistedState, PlaybackState, SongId, SongInfo, StatusSnapshot,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One configured source instance
pub(super) struct SourceEntry {
    pub(super) source: Arc<dyn Source>,
    /// Named construction parameters, persisted as given
    pub(super) params: SourceParams,
}

/// Everything the actor needs at startup
pub struct EngineParts {
    pub settings: EngineSettings,
    pub output: Box<dyn AudioOutput>,
    pub store: Arc<dyn StateStore>,
    pub registry: Arc<SourceRegistry>,
    /// State restored from the previous run
    pub initial: PersistedState,
}

/// The single writer of playback state
pub(super) struct EngineActor {
    pub(super) settings: EngineSettings,
    pub(super) queue: QueueManager,
    pub(super) state: PlaybackState,

    /// Cursor of the song being played or paused
    pub(super) cursor: Option<SeekBuffer>,
    /// Id of the song held by `cursor`
    pub(super) current: Option<SongId>,
    pub(super) elapsed: Duration,
    /// Truncation restarts of the current song
    pub(super) restarts: u32,

    pub(super) output: Box<dyn AudioOutput>,
    /// Format the output is currently open for
    pub(super) output_format: Option<(u32, u16)>,

    pub(super) broadcaster: Broadcaster,
    pub(super) registry: Arc<SourceRegistry>,
    /// Source kind -> instance key -> instance
    pub(super) sources: BTreeMap<String, BTreeMap<String, SourceEntry>>,
    /// Aggregated catalog of every instance
    pub(super) songs: BTreeMap<SongId, SongInfo>,

    pub(super) shared: Arc<SharedState>,
    pub(super) store: Arc<dyn StateStore>,
    pub(super) save_pending: bool,
    pub(super) last_status: Option<Instant>,
    pub(super) rng: StdRng,
    pub(super) ticker: Option<Interval>,
    /// Own inbox, for background work reporting back
    pub(super) commands: mpsc::WeakSender<Command>,

    /// Source parameters waiting to be re-created at startup
    pub(super) restore: BTreeMap<String, BTreeMap<String, SourceParams>>,
}

impl EngineActor {
    pub(super) fn new(
        parts: EngineParts,
        shared: Arc<SharedState>,
        commands: mpsc::WeakSender<Command>,
    ) -> Self {
        let EngineParts {
            settings,
            output,
            store,
            registry,
            initial,
        } = parts;

        Self {
            queue: QueueManager::from_persisted(&initial),
            state: PlaybackState::Stopped,
            cursor: None,
            current: None,
            elapsed: Duration::ZERO,
            restarts: 0,
            output,
            output_format: None,
            broadcaster: Broadcaster::new(commands.clone()),
            registry,
            sources: BTreeMap::new(),
            songs: BTreeMap::new(),
            shared,
            store,
            save_pending: false,
            last_status: None,
            rng: StdRng::from_entropy(),
            ticker: None,
            commands,
            restore: initial.sources,
            settings,
        }
    }

    /// Run until `Shutdown` or until every handle is dropped
    pub(super) async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!("Playback engine started ({} songs queued)", self.queue.len());
        self.restore_sources();
        self.publish_lists().await;
        self.publish_sources().await;
        self.publish_tracks().await;
        self.publish_status().await;

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        info!("All engine handles dropped");
                        self.shutdown().await;
                        break;
                    };
                    if !self.handle(command).await {
                        break;
                    }
                }
                _ = next_tick(&mut self.ticker) => {
                    self.tick().await;
                    self.sync_ticker();
                }
            }
        }
        info!("Playback engine stopped");
    }

    /// Process one command; `false` ends the loop
    async fn handle(&mut self, command: Command) -> bool {
        debug!("Command: {}", command.name());
        let mutates = command.mutates_state();

        match command {
            Command::Play => self.play(),
            Command::Stop => {
                self.output.clear();
                self.stop();
                self.release_output();
            }
            Command::Next => {
                self.output.clear();
                self.next();
            }
            Command::Prev => {
                self.output.clear();
                self.prev();
            }
            Command::Pause => self.pause(),
            Command::ToggleRandom => {
                let random = self.queue.toggle_random();
                info!("Random {}", if random { "on" } else { "off" });
            }
            Command::ToggleRepeat => {
                let repeat = self.queue.toggle_repeat();
                info!("Repeat {}", if repeat { "on" } else { "off" });
            }
            Command::PlayIndex(index) => {
                self.output.clear();
                self.play_index(index);
            }
            Command::Seek { position, reply } => {
                let _ = reply.send(self.seek(position));
            }
            Command::QueueChange { change, reply } => {
                let errors = self.change_queue(&change).await;
                let _ = reply.send(errors);
            }
            Command::PlaylistChange { name, change, reply } => {
                let errors = self.change_playlist(&name, &change).await;
                let _ = reply.send(errors);
            }
            Command::AddSource { kind, params, reply } => {
                let result = self.add_source(kind, params).await;
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("Source not added: {}", e);
                        }
                    }
                }
            }
            Command::RemoveSource { kind, key, reply } => {
                let _ = reply.send(self.remove_source(&kind, &key).await);
            }
            Command::RefreshSource { kind, key, reply } => {
                let _ = reply.send(self.refresh_source(&kind, &key));
            }
            Command::SourceListed { kind, key, result } => {
                self.source_listed(kind, key, result).await;
            }
            Command::AddObserver { observer, reply } => {
                let id = Uuid::new_v4();
                self.broadcaster.add_observer(id, observer);
                self.send_initial(id);
                let _ = reply.send(id);
            }
            Command::RemoveObserver(id) => {
                self.broadcaster.remove_observer(id);
            }
            Command::AddListener { sender, reply } => {
                let id = Uuid::new_v4();
                self.broadcaster.add_listener(id, sender);
                let _ = reply.send(id);
            }
            Command::RemoveListener(id) => {
                self.broadcaster.remove_listener(id);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Save => self.save(),
            Command::SaveFailed(message) => {
                self.broadcaster
                    .broadcast(JukeboxEvent::error(format!("cannot save state: {}", message)));
            }
            Command::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }

        if mutates {
            self.publish_status().await;
            self.schedule_save();
        }
        self.sync_ticker();
        true
    }

    /// Arm the tick timer while playing, disarm it otherwise
    pub(super) fn sync_ticker(&mut self) {
        if self.state != PlaybackState::Playing {
            self.ticker = None;
            return;
        }
        if self.ticker.is_none() {
            let period = self.tick_period();
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!("Tick timer armed ({:?})", period);
            self.ticker = Some(ticker);
        }
    }

    /// Half the play time of one chunk, so the output never starves
    fn tick_period(&self) -> Duration {
        let (sample_rate, channels) = self.output_format.unwrap_or((44_100, 2));
        let chunk = samples_to_duration(self.settings.chunk_samples as u64, sample_rate, channels);
        (chunk / 2).max(Duration::from_millis(1))
    }

    /// Current transport status
    pub(super) fn snapshot(&self) -> StatusSnapshot {
        let info = self.current.as_ref().and_then(|id| {
            self.songs
                .get(id)
                .cloned()
                .or_else(|| self.cursor.as_ref().map(|c| c.info()))
        });
        StatusSnapshot {
            state: self.state,
            song: self.current.clone(),
            duration_ms: info.as_ref().map(|i| i.duration_ms).unwrap_or(0),
            info,
            index: self.queue.index(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            random: self.queue.random(),
            repeat: self.queue.repeat(),
            queue_len: self.queue.len(),
        }
    }

    pub(super) async fn publish_status(&mut self) {
        let status = self.snapshot();
        self.shared.set_status(status.clone()).await;
        self.broadcaster.broadcast(JukeboxEvent::status(status));
        self.last_status = Some(Instant::now());
    }

    /// Whether the throttled in-song status broadcast is due
    pub(super) fn status_due(&self) -> bool {
        self.last_status
            .map_or(true, |at| at.elapsed() >= self.settings.status_interval())
    }

    pub(super) async fn publish_lists(&mut self) {
        let queue = self.queue.queue().clone();
        let playlists = self.queue.playlists().clone();
        self.shared.set_lists(queue.clone(), playlists.clone()).await;
        self.broadcaster
            .broadcast(JukeboxEvent::queue_changed(queue, playlists));
    }

    pub(super) fn sources_summary(&self) -> BTreeMap<String, Vec<String>> {
        self.sources
            .iter()
            .map(|(kind, instances)| (kind.clone(), instances.keys().cloned().collect()))
            .collect()
    }

    pub(super) async fn publish_sources(&mut self) {
        let summary = self.sources_summary();
        self.shared.set_sources(summary.clone()).await;
        self.broadcaster.broadcast(JukeboxEvent::sources_changed(summary));
    }

    pub(super) async fn publish_tracks(&mut self) {
        self.shared.set_tracks(self.songs.clone()).await;
        self.broadcaster
            .broadcast(JukeboxEvent::tracks_changed(self.track_entries()));
    }

    fn track_entries(&self) -> Vec<jukebox_common::TrackEntry> {
        self.songs
            .iter()
            .map(|(id, info)| jukebox_common::TrackEntry {
                id: id.clone(),
                info: info.clone(),
            })
            .collect()
    }

    /// Snapshots every new observer starts from
    fn send_initial(&self, id: Uuid) {
        let events = [
            JukeboxEvent::queue_changed(self.queue.queue().clone(), self.queue.playlists().clone()),
            JukeboxEvent::sources_changed(self.sources_summary()),
            JukeboxEvent::status(self.snapshot()),
            JukeboxEvent::tracks_changed(self.track_entries()),
        ];
        for event in events {
            self.broadcaster.send_to(id, Arc::new(event));
        }
    }

    /// Log a recoverable failure and surface it to observers
    pub(super) fn report(&self, context: &str, err: &Error) {
        warn!("{}: {}", context, err);
        self.broadcaster
            .broadcast(JukeboxEvent::error(format!("{}: {}", context, err)));
    }

    /// Snapshot of everything that survives a restart
    pub(super) fn persisted(&self) -> PersistedState {
        let mut state = PersistedState::default();
        self.queue.persist_into(&mut state);
        state.sources = self
            .sources
            .iter()
            .map(|(kind, instances)| {
                (
                    kind.clone(),
                    instances
                        .iter()
                        .map(|(key, entry)| (key.clone(), entry.params.clone()))
                        .collect(),
                )
            })
            .collect();
        // Instances that failed to come back are kept for the next run
        for (kind, instances) in &self.restore {
            let saved = state.sources.entry(kind.clone()).or_default();
            for (key, params) in instances {
                saved.entry(key.clone()).or_insert_with(|| params.clone());
            }
        }
        state
    }

    /// Schedule a save unless one is already pending
    pub(super) fn schedule_save(&mut self) {
        if self.save_pending {
            return;
        }
        self.save_pending = true;
        let delay = self.settings.save_delay();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Save).await;
            }
        });
    }

    /// Write the snapshot out of band
    fn save(&mut self) {
        self.save_pending = false;
        let state = self.persisted();
        let store = Arc::clone(&self.store);
        let commands = self.commands.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(&state).await {
                error!("Failed to save state: {}", e);
                if let Some(commands) = commands.upgrade() {
                    let _ = commands.send(Command::SaveFailed(e.to_string())).await;
                }
            }
        });
    }

    /// Release the output device; it is reopened by the next song
    pub(super) fn release_output(&mut self) {
        if self.output_format.take().is_some() {
            self.output.close();
            debug!("Audio output released");
        }
    }

    async fn shutdown(&mut self) {
        info!("Playback engine shutting down");
        self.save_pending = false;
        let state = self.persisted();
        if let Err(e) = self.store.save(&state).await {
            error!("Final save failed: {}", e);
        }
        self.release_song();
        self.state = PlaybackState::Stopped;
        self.release_output();
        self.ticker = None;
    }
}

/// Resolves on the next tick, never while disarmed
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
