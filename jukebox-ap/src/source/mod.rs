//! Source collaborators
//!
//! A source instance exposes a catalog of tracks under stable ids and turns
//! a track id into a [`Song`]. Kinds are registered by name in a
//! [`SourceRegistry`] together with the parameters their constructor needs.

pub mod file;

pub use file::FileSource;

use crate::codec::Song;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::persisted::SourceParams;
use jukebox_common::SongInfo;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Songs and playlists published by one source instance
///
/// Keys are track ids local to the instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub songs: BTreeMap<String, SongInfo>,
    pub playlists: BTreeMap<String, Vec<String>>,
}

/// One configured source instance
#[async_trait]
pub trait Source: Send + Sync {
    /// Unique identity of the instance within its kind
    fn key(&self) -> String;

    /// Catalog, possibly cached
    async fn list(&self) -> Result<Catalog>;

    /// Rebuild the catalog
    async fn refresh(&self) -> Result<Catalog>;

    /// Metadata for one track
    fn info(&self, track: &str) -> Result<SongInfo>;

    /// Playable handle for one track; decoding starts at `Song::init`
    fn get_song(&self, track: &str) -> Result<Box<dyn Song>>;
}

/// Constructor taking the kind's parameters in declaration order
pub type SourceFactory = fn(&[String]) -> Result<Arc<dyn Source>>;

/// Parameter names of a source kind, as reported to clients
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceKind {
    pub params: Vec<String>,
}

struct Registration {
    params: &'static [&'static str],
    create: SourceFactory,
}

/// Source kinds available to `AddSource`
pub struct SourceRegistry {
    kinds: BTreeMap<String, Registration>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Registry with the built-in kinds (`file`)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(file::KIND, file::PARAMS, file::create);
        registry
    }

    pub fn register(&mut self, name: &str, params: &'static [&'static str], create: SourceFactory) {
        self.kinds.insert(name.to_string(), Registration { params, create });
    }

    /// Kind name -> parameter names
    pub fn describe(&self) -> BTreeMap<String, SourceKind> {
        self.kinds
            .iter()
            .map(|(name, reg)| {
                (
                    name.clone(),
                    SourceKind {
                        params: reg.params.iter().map(|p| p.to_string()).collect(),
                    },
                )
            })
            .collect()
    }

    /// Build an instance; unknown kinds and wrong arity are caller errors
    pub fn create(&self, kind: &str, params: &[String]) -> Result<Arc<dyn Source>> {
        let reg = self
            .kinds
            .get(kind)
            .ok_or_else(|| Error::BadRequest(format!("unknown source kind: {}", kind)))?;
        if params.len() != reg.params.len() {
            return Err(Error::BadRequest(format!(
                "source kind {} expects {} parameter(s), got {}",
                kind,
                reg.params.len(),
                params.len()
            )));
        }
        (reg.create)(params)
    }

    /// Pair positional parameters with their names for persistence
    pub fn named_params(&self, kind: &str, params: &[String]) -> SourceParams {
        self.kinds
            .get(kind)
            .map(|reg| {
                reg.params
                    .iter()
                    .zip(params)
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inverse of [`named_params`](Self::named_params); missing names are caller errors
    pub fn positional_params(&self, kind: &str, named: &SourceParams) -> Result<Vec<String>> {
        let reg = self
            .kinds
            .get(kind)
            .ok_or_else(|| Error::BadRequest(format!("unknown source kind: {}", kind)))?;
        reg.params
            .iter()
            .map(|name| {
                named
                    .get(*name)
                    .cloned()
                    .ok_or_else(|| Error::BadRequest(format!("missing parameter {} for {}", name, kind)))
            })
            .collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
