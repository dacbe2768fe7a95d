//! Queue, playlist and source commands for the playback actor

use super::commands::Command;
use super::actor::{EngineActor, SourceEntry};
use crate::error::{Error, Result};
use crate::playback::queue::QueueChange;
use crate::source::{Catalog, Source};
use jukebox_common::song::SONG_ID_DELIMITER;
use jukebox_common::SongId;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl EngineActor {
    /// Edit the live queue; an emptied or cleared queue stops playback
    pub(super) async fn change_queue(&mut self, change: &QueueChange) -> Vec<String> {
        let outcome = self.queue.change_queue(change);
        if outcome.cleared {
            self.stop();
            self.queue.set_index(0);
        }
        debug!(
            "Queue now {} songs ({} notes)",
            self.queue.len(),
            outcome.errors.len()
        );
        self.publish_lists().await;
        outcome.errors
    }

    pub(super) async fn change_playlist(&mut self, name: &str, change: &QueueChange) -> Vec<String> {
        let outcome = self.queue.change_playlist(name, change);
        debug!("Playlist {} now {} songs", name, outcome.list.len());
        self.publish_lists().await;
        outcome.errors
    }

    /// Create a source instance and list it in the background
    ///
    /// An instance with the same key replaces the existing one.
    pub(super) async fn add_source(&mut self, kind: String, params: Vec<String>) -> Result<String> {
        let source = self.registry.create(&kind, &params)?;
        let key = source.key();
        if key.contains(SONG_ID_DELIMITER) {
            return Err(Error::BadRequest(format!(
                "source key may not contain '{}': {}",
                SONG_ID_DELIMITER, key
            )));
        }

        let entry = SourceEntry {
            source: Arc::clone(&source),
            params: self.registry.named_params(&kind, &params),
        };
        if let Some(pending) = self.restore.get_mut(&kind) {
            pending.remove(&key);
        }
        self.sources
            .entry(kind.clone())
            .or_default()
            .insert(key.clone(), entry);
        info!("Added source {}|{}", kind, key);

        self.spawn_listing(kind, key.clone(), source, false);
        self.publish_sources().await;
        Ok(key)
    }

    pub(super) async fn remove_source(&mut self, kind: &str, key: &str) -> Result<()> {
        let instances = self
            .sources
            .get_mut(kind)
            .ok_or_else(|| Error::NotFound(format!("no source instance {}|{}", kind, key)))?;
        if instances.remove(key).is_none() {
            return Err(Error::NotFound(format!("no source instance {}|{}", kind, key)));
        }
        if instances.is_empty() {
            self.sources.remove(kind);
        }
        if let Some(pending) = self.restore.get_mut(kind) {
            pending.remove(key);
        }

        let before = self.songs.len();
        self.songs.retain(|id, _| !id.belongs_to(kind, key));
        info!(
            "Removed source {}|{} ({} songs purged)",
            kind,
            key,
            before - self.songs.len()
        );

        self.publish_tracks().await;
        self.publish_sources().await;
        Ok(())
    }

    pub(super) fn refresh_source(&mut self, kind: &str, key: &str) -> Result<()> {
        let source = self
            .sources
            .get(kind)
            .and_then(|instances| instances.get(key))
            .map(|entry| Arc::clone(&entry.source))
            .ok_or_else(|| Error::NotFound(format!("no source instance {}|{}", kind, key)))?;
        self.spawn_listing(kind.to_string(), key.to_string(), source, true);
        Ok(())
    }

    /// Fetch a catalog off the actor and feed it back as `SourceListed`
    fn spawn_listing(&self, kind: String, key: String, source: Arc<dyn Source>, refresh: bool) {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let result = if refresh {
                source.refresh().await
            } else {
                source.list().await
            };
            if let Some(commands) = commands.upgrade() {
                let _ = commands
                    .send(Command::SourceListed { kind, key, result })
                    .await;
            }
        });
    }

    /// Replace the cached songs of one instance
    pub(super) async fn source_listed(&mut self, kind: String, key: String, result: Result<Catalog>) {
        let registered = self
            .sources
            .get(&kind)
            .is_some_and(|instances| instances.contains_key(&key));
        if !registered {
            debug!("Dropping listing of removed source {}|{}", kind, key);
            return;
        }

        let catalog = match result {
            Ok(catalog) => catalog,
            Err(e) => {
                self.report(&format!("cannot list {}|{}", kind, key), &e);
                return;
            }
        };

        self.songs.retain(|id, _| !id.belongs_to(&kind, &key));
        for (track, info) in catalog.songs {
            match SongId::new(kind.as_str(), key.as_str(), track) {
                Ok(id) => {
                    self.songs.insert(id, info);
                }
                Err(e) => warn!("Skipping track of {}|{}: {}", kind, key, e),
            }
        }

        let mut seeded = false;
        for (name, tracks) in catalog.playlists {
            let songs = tracks
                .into_iter()
                .filter_map(|track| SongId::new(kind.as_str(), key.as_str(), track).ok())
                .collect();
            seeded |= self.queue.seed_playlist(&name, songs);
        }

        info!("Listed {}|{}: {} songs total", kind, key, self.songs.len());
        if seeded {
            self.publish_lists().await;
        }
        self.publish_tracks().await;
        self.publish_sources().await;
    }

    /// Re-create the instances saved by the previous run
    pub(super) fn restore_sources(&mut self) {
        let saved = std::mem::take(&mut self.restore);
        let mut failed = saved.clone();

        for (kind, instances) in saved {
            for (key, named) in instances {
                let params = match self.registry.positional_params(&kind, &named) {
                    Ok(params) => params,
                    Err(e) => {
                        warn!("Cannot restore source {}|{}: {}", kind, key, e);
                        continue;
                    }
                };
                let source = match self.registry.create(&kind, &params) {
                    Ok(source) => source,
                    Err(e) => {
                        warn!("Cannot restore source {}|{}: {}", kind, key, e);
                        continue;
                    }
                };

                let restored_key = source.key();
                self.sources.entry(kind.clone()).or_default().insert(
                    restored_key.clone(),
                    SourceEntry {
                        source: Arc::clone(&source),
                        params: named,
                    },
                );
                if let Some(pending) = failed.get_mut(&kind) {
                    pending.remove(&key);
                }
                debug!("Restored source {}|{}", kind, restored_key);
                self.spawn_listing(kind.clone(), restored_key, source, false);
            }
        }

        failed.retain(|_, instances| !instances.is_empty());
        self.restore = failed;
    }
}
