//! In-process collaborators for engine tests
//!
//! - `FakeCatalog` / `FakeSource`: a source kind ("fake") whose tracks are
//!   synthetic tones with scripted failures
//! - `RecordingOutput`: an audio output that counts what it is asked to do

use jukebox_ap::audio::AudioOutput;
use jukebox_ap::codec::Song;
use jukebox_ap::db::StateStore;
use jukebox_ap::error::{Error, Result};
use jukebox_ap::source::{Catalog, Source, SourceRegistry};
use async_trait::async_trait;
use jukebox_common::time::duration_to_samples;
use jukebox_common::{PersistedState, SongInfo};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use uuid::Uuid;

/// Source kind name the fake is registered under
pub const FAKE_KIND: &str = "fake";

/// Interleaved samples produced by one `ToneSong::play` call
const PACKET: usize = 1000;

/// Scripted misbehaviour of a fake track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    /// `get_song` fails
    Missing,
    /// `init` fails
    Init,
    /// `play` fails with a decode error once this many samples were produced
    DecodeAt(usize),
    /// `play` reports truncation once this many samples were produced
    TruncateAt(usize),
}

#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub title: String,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Report the duration in `SongInfo`
    pub known_duration: bool,
    pub failure: Option<Failure>,
}

impl TrackSpec {
    /// Stereo 44.1 kHz tone
    pub fn tone(title: &str, duration_ms: u64) -> Self {
        Self {
            title: title.to_string(),
            duration_ms,
            sample_rate: 44100,
            channels: 2,
            known_duration: true,
            failure: None,
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self
    }

    pub fn unknown_duration(mut self) -> Self {
        self.known_duration = false;
        self
    }

    fn info(&self) -> SongInfo {
        SongInfo {
            title: self.title.clone(),
            artist: "Test Artist".to_string(),
            album: "Test Album".to_string(),
            track: 0,
            duration_ms: if self.known_duration { self.duration_ms } else { 0 },
        }
    }

    fn total_samples(&self) -> usize {
        duration_to_samples(
            Duration::from_millis(self.duration_ms),
            self.sample_rate,
            self.channels,
        ) as usize
    }
}

/// Constant-valued tone honouring the `Song` contract
pub struct ToneSong {
    spec: TrackSpec,
    total: usize,
    emitted: usize,
    open: bool,
}

impl ToneSong {
    pub fn new(spec: TrackSpec) -> Self {
        let total = spec.total_samples();
        Self {
            spec,
            total,
            emitted: 0,
            open: false,
        }
    }
}

impl Song for ToneSong {
    fn init(&mut self) -> Result<(u32, u16)> {
        if self.spec.failure == Some(Failure::Init) {
            return Err(Error::Decode(format!("{} cannot be opened", self.spec.title)));
        }
        self.open = true;
        self.emitted = 0;
        Ok((self.spec.sample_rate, self.spec.channels))
    }

    fn play(&mut self, _n: usize) -> Result<Vec<f32>> {
        if !self.open {
            return Err(Error::Internal("play before init".to_string()));
        }

        let mut limit = self.total;
        match self.spec.failure {
            Some(Failure::DecodeAt(at)) => {
                if self.emitted >= at {
                    return Err(Error::Decode(format!("{} is corrupt", self.spec.title)));
                }
                limit = limit.min(at);
            }
            Some(Failure::TruncateAt(at)) => {
                if self.emitted >= at {
                    return Err(Error::Truncated(format!("{} ended early", self.spec.title)));
                }
                limit = limit.min(at);
            }
            _ => {}
        }

        let take = PACKET.min(limit.saturating_sub(self.emitted));
        self.emitted += take;
        Ok(vec![0.25; take])
    }

    fn seek(&mut self, to: Duration) -> Result<()> {
        let target = duration_to_samples(to, self.spec.sample_rate, self.spec.channels) as usize;
        self.emitted = target.min(self.total);
        Ok(())
    }

    fn info(&self) -> SongInfo {
        self.spec.info()
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Tracks and playlists served by one fake source instance
pub struct FakeCatalog {
    /// Instance key, unique per catalog
    pub name: String,
    tracks: BTreeMap<String, TrackSpec>,
    playlists: BTreeMap<String, Vec<String>>,
    opened: Mutex<HashMap<String, usize>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            name: format!("fake-{}", Uuid::new_v4()),
            tracks: BTreeMap::new(),
            playlists: BTreeMap::new(),
            opened: Mutex::new(HashMap::new()),
        }
    }

    pub fn track(mut self, id: &str, spec: TrackSpec) -> Self {
        self.tracks.insert(id.to_string(), spec);
        self
    }

    /// `count` one-second tones named `t0`, `t1`, ...
    pub fn tones(mut self, count: usize, duration_ms: u64) -> Self {
        for i in 0..count {
            let id = format!("t{}", i);
            self.tracks.insert(id.clone(), TrackSpec::tone(&id, duration_ms));
        }
        self
    }

    pub fn playlist(mut self, name: &str, tracks: &[&str]) -> Self {
        self.playlists.insert(
            name.to_string(),
            tracks.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Make the catalog reachable through the `fake` source kind
    pub fn install(self) -> Arc<Self> {
        let catalog = Arc::new(self);
        installed()
            .lock()
            .unwrap()
            .insert(catalog.name.clone(), Arc::clone(&catalog));
        catalog
    }

    /// How many times `get_song` was called for a track
    pub fn opened(&self, track: &str) -> usize {
        self.opened.lock().unwrap().get(track).copied().unwrap_or(0)
    }

    /// Wire form of a track's song id
    pub fn id(&self, track: &str) -> String {
        format!("{}|{}|{}", FAKE_KIND, self.name, track)
    }

    fn catalog(&self) -> Catalog {
        Catalog {
            songs: self
                .tracks
                .iter()
                .map(|(id, spec)| (id.clone(), spec.info()))
                .collect(),
            playlists: self.playlists.clone(),
        }
    }
}

fn installed() -> &'static Mutex<HashMap<String, Arc<FakeCatalog>>> {
    static CATALOGS: OnceLock<Mutex<HashMap<String, Arc<FakeCatalog>>>> = OnceLock::new();
    CATALOGS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub struct FakeSource {
    catalog: Arc<FakeCatalog>,
}

#[async_trait]
impl Source for FakeSource {
    fn key(&self) -> String {
        self.catalog.name.clone()
    }

    async fn list(&self) -> Result<Catalog> {
        Ok(self.catalog.catalog())
    }

    async fn refresh(&self) -> Result<Catalog> {
        Ok(self.catalog.catalog())
    }

    fn info(&self, track: &str) -> Result<SongInfo> {
        self.catalog
            .tracks
            .get(track)
            .map(TrackSpec::info)
            .ok_or_else(|| Error::NotFound(track.to_string()))
    }

    fn get_song(&self, track: &str) -> Result<Box<dyn Song>> {
        *self
            .catalog
            .opened
            .lock()
            .unwrap()
            .entry(track.to_string())
            .or_default() += 1;

        let spec = self
            .catalog
            .tracks
            .get(track)
            .ok_or_else(|| Error::NotFound(track.to_string()))?;
        if spec.failure == Some(Failure::Missing) {
            return Err(Error::NotFound(format!("{} went away", track)));
        }
        Ok(Box::new(ToneSong::new(spec.clone())))
    }
}

fn create_fake(params: &[String]) -> Result<Arc<dyn Source>> {
    let name = &params[0];
    let catalog = installed()
        .lock()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| Error::BadRequest(format!("no fake catalog {}", name)))?;
    Ok(Arc::new(FakeSource { catalog }))
}

/// Built-in kinds plus `fake`
pub fn fake_registry() -> Arc<SourceRegistry> {
    let mut registry = SourceRegistry::with_defaults();
    registry.register(FAKE_KIND, &["name"], create_fake);
    Arc::new(registry)
}

/// What the engine asked of its output
#[derive(Debug, Default)]
pub struct Recording {
    pub opens: Vec<(u32, u16)>,
    pub samples: usize,
    pub starts: usize,
    pub stops: usize,
    pub clears: usize,
    pub closes: usize,
    pub running: bool,
}

/// Output that accepts everything instantly
pub struct RecordingOutput {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingOutput {
    pub fn new() -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        (
            Self {
                recording: Arc::clone(&recording),
            },
            recording,
        )
    }
}

impl AudioOutput for RecordingOutput {
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        self.recording.lock().unwrap().opens.push((sample_rate, channels));
        Ok(())
    }

    fn push(&mut self, samples: &[f32]) -> Result<()> {
        self.recording.lock().unwrap().samples += samples.len();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut recording = self.recording.lock().unwrap();
        recording.starts += 1;
        recording.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut recording = self.recording.lock().unwrap();
        recording.stops += 1;
        recording.running = false;
    }

    fn clear(&mut self) {
        self.recording.lock().unwrap().clears += 1;
    }

    fn close(&mut self) {
        let mut recording = self.recording.lock().unwrap();
        recording.closes += 1;
        recording.running = false;
    }

    fn backlog(&self) -> Duration {
        Duration::ZERO
    }
}

/// Store whose saves always fail
pub struct FailingStore;

#[async_trait]
impl StateStore for FailingStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(None)
    }

    async fn save(&self, _state: &PersistedState) -> Result<()> {
        Err(Error::Internal("disk full".to_string()))
    }
}
