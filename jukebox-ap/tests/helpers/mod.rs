//! Test helper modules for jukebox-ap integration tests
//!
//! - `TestEngine`: spawn a playback engine over fake sources and a
//!   recording output
//! - `fakes`: scripted sources, songs and outputs
//! - `audio_generator`: WAV files for the `file` source

pub mod audio_generator;
pub mod fakes;

pub use fakes::{FakeCatalog, Failure, Recording, TrackSpec, FAKE_KIND};

use jukebox_ap::config::EngineSettings;
use jukebox_ap::db::{MemoryStore, StateStore};
use jukebox_ap::playback::{ChannelObserver, EngineParts, PlaybackEngine, QueueChange};
use jukebox_common::{JukeboxEvent, PersistedState, StatusSnapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Engine settings scaled for tests: 50 ms chunks, short save debounce
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        chunk_samples: 4410,
        status_interval_ms: 100,
        save_delay_ms: 200,
        ..Default::default()
    }
}

/// A running engine plus handles on its collaborators
pub struct TestEngine {
    pub engine: PlaybackEngine,
    pub task: JoinHandle<()>,
    pub output: Arc<Mutex<Recording>>,
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<FakeCatalog>,
}

impl TestEngine {
    /// Engine with `catalog` added as a source and nothing queued
    pub async fn start(catalog: FakeCatalog) -> Self {
        Self::start_with(catalog, test_settings(), PersistedState::default()).await
    }

    pub async fn start_with(
        catalog: FakeCatalog,
        settings: EngineSettings,
        initial: PersistedState,
    ) -> Self {
        let t = Self::spawn(catalog, settings, initial);
        let key = t
            .engine
            .add_source(FAKE_KIND.to_string(), vec![t.catalog.name.clone()])
            .await
            .expect("fake source accepted");
        assert_eq!(key, t.catalog.name);
        t
    }

    /// Engine with the catalog installed but not added
    pub fn spawn(catalog: FakeCatalog, settings: EngineSettings, initial: PersistedState) -> Self {
        let catalog = catalog.install();
        let (output, recording) = fakes::RecordingOutput::new();
        let store = Arc::new(MemoryStore::new());

        let (engine, task) = PlaybackEngine::spawn(EngineParts {
            settings,
            output: Box::new(output),
            store: Arc::clone(&store) as Arc<dyn StateStore>,
            registry: fakes::fake_registry(),
            initial,
        });

        Self {
            engine,
            task,
            output: recording,
            store,
            catalog,
        }
    }

    /// Append tracks of the fake catalog to the queue
    pub async fn enqueue(&self, tracks: &[&str]) {
        let errors = self
            .engine
            .change_queue(QueueChange {
                add: tracks.iter().map(|t| self.catalog.id(t)).collect(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(errors.is_empty(), "unexpected queue errors: {:?}", errors);
    }

    /// Track id of the song currently held, if any
    pub fn track_of(status: &StatusSnapshot) -> Option<String> {
        status.song.as_ref().map(|id| id.track.clone())
    }

    /// Poll status until `pred` holds
    ///
    /// Polls in (virtual) 10 ms steps and gives up after a minute.
    pub async fn wait_for(&self, pred: impl Fn(&StatusSnapshot) -> bool) -> StatusSnapshot {
        let mut last = None;
        for _ in 0..6000 {
            let status = self.engine.status().await.unwrap();
            if pred(&status) {
                return status;
            }
            last = Some(status);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never met; last status: {:?}", last);
    }

    /// Wait until the shared track listing has `count` entries
    pub async fn wait_for_tracks(&self, count: usize) {
        for _ in 0..1000 {
            if self.engine.state().get_tracks().await.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("track listing never reached {} entries", count);
    }

    /// Register a channel observer and return its event stream
    pub async fn observe(&self) -> mpsc::Receiver<Arc<JukeboxEvent>> {
        let (observer, rx) = ChannelObserver::new(256, Duration::from_secs(5));
        self.engine.add_observer(Arc::new(observer)).await.unwrap();
        rx
    }

    pub async fn shutdown(self) -> Arc<MemoryStore> {
        self.engine.shutdown().await.unwrap();
        self.task.await.unwrap();
        self.store
    }
}

/// Receive events until one matches `pred`
pub async fn next_event(
    rx: &mut mpsc::Receiver<Arc<JukeboxEvent>>,
    pred: impl Fn(&JukeboxEvent) -> bool,
) -> Arc<JukeboxEvent> {
    let found = tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = rx.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await;

    match found {
        Ok(Some(event)) => event,
        Ok(None) => panic!("observer stream closed"),
        Err(_) => panic!("no matching event"),
    }
}
