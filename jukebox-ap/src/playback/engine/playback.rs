//! Transport control for the playback actor
//!
//! play/stop/next/prev/pause/seek and the tick step that feeds the output.

use super::actor::EngineActor;
use crate::error::{Error, Result};
use crate::playback::seek::SeekBuffer;
use jukebox_common::PlaybackState;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

impl EngineActor {
    /// Resume the current song, or resolve the next playable one
    ///
    /// Songs that fail to resolve or initialise are reported and skipped;
    /// at most one attempt per queue entry is made before settling in
    /// `Stopped`.
    pub(super) fn play(&mut self) {
        if self.cursor.is_some() {
            if self.state != PlaybackState::Playing {
                self.resume();
            }
            return;
        }

        let attempts = self.queue.len();
        let mut tried = HashSet::new();
        for _ in 0..attempts {
            if !self.queue.wrap() {
                info!("End of queue");
                break;
            }
            tried.insert(self.queue.index());
            match self.load_current() {
                Ok(()) => return,
                Err(e) => {
                    let id = self
                        .queue
                        .current()
                        .map(|id| id.to_string())
                        .unwrap_or_default();
                    self.report(&format!("cannot play {}", id), &e);
                    if !self.queue.advance_untried(&mut self.rng, &tried) {
                        break;
                    }
                }
            }
        }

        if self.queue.index() >= self.queue.len() {
            self.queue.set_index(0);
        }
        self.settle_stopped();
    }

    /// Resolve the song at the queue index and start feeding it
    fn load_current(&mut self) -> Result<()> {
        let id = self
            .queue
            .current()
            .cloned()
            .ok_or_else(|| Error::Internal("queue index out of range".to_string()))?;
        let source = self
            .sources
            .get(&id.source)
            .and_then(|instances| instances.get(&id.key))
            .map(|entry| entry.source.clone())
            .ok_or_else(|| Error::NotFound(format!("no source instance {}|{}", id.source, id.key)))?;

        let mut song = source.get_song(&id.track)?;
        let (sample_rate, channels) = match song.init() {
            Ok(format) => format,
            Err(e) => {
                song.close();
                return Err(e);
            }
        };
        // Dropping the cursor on any error below closes the song
        let cursor = SeekBuffer::new(song, sample_rate, channels);

        if self.output_format != Some((sample_rate, channels)) {
            self.release_output();
            self.output.open(sample_rate, channels)?;
            self.output_format = Some((sample_rate, channels));
        }
        self.output.start()?;

        info!("Playing {} ({} Hz, {} ch)", id, sample_rate, channels);
        self.cursor = Some(cursor);
        self.current = Some(id);
        self.elapsed = Duration::ZERO;
        self.state = PlaybackState::Playing;
        // Period depends on the song's format
        self.ticker = None;
        Ok(())
    }

    fn resume(&mut self) {
        if let Err(e) = self.output.start() {
            self.report("cannot resume output", &e);
            self.next();
            return;
        }
        info!("Resumed");
        self.state = PlaybackState::Playing;
    }

    /// Drop the current song; returns whether one was held
    pub(super) fn release_song(&mut self) -> bool {
        self.current = None;
        match self.cursor.take() {
            Some(mut cursor) => {
                cursor.close();
                self.output.stop();
                true
            }
            None => false,
        }
    }

    fn settle_stopped(&mut self) {
        self.release_song();
        self.state = PlaybackState::Stopped;
        self.elapsed = Duration::ZERO;
        self.restarts = 0;
    }

    /// Release the song and move the index past it
    pub(super) fn stop(&mut self) {
        if self.release_song() {
            self.queue.advance(&mut self.rng);
        }
        if self.state != PlaybackState::Stopped {
            info!("Stopped");
        }
        self.settle_stopped();
    }

    pub(super) fn next(&mut self) {
        self.stop();
        self.play();
    }

    /// Step back one song, or two within the restart threshold, then play
    pub(super) fn prev(&mut self) {
        self.queue
            .rewind(self.elapsed, self.settings.prev_restart_threshold());
        self.next();
    }

    /// Toggle Playing and Paused; from Stopped this is `play`
    pub(super) fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.output.stop();
                self.state = PlaybackState::Paused;
                info!("Paused at {:?}", self.elapsed);
            }
            PlaybackState::Paused | PlaybackState::Stopped => self.play(),
        }
    }

    pub(super) fn play_index(&mut self, index: usize) {
        self.stop();
        self.queue.set_index(index);
        self.play();
    }

    /// Reposition the current song
    pub(super) fn seek(&mut self, position: Duration) -> Result<()> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| Error::BadRequest("no song is loaded".to_string()))?;
        cursor.seek(position)?;
        self.elapsed = cursor.position();
        self.output.clear();
        info!("Seeked to {:?}", self.elapsed);
        Ok(())
    }

    /// One bounded step of decoding while playing
    pub(super) async fn tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if self.output.backlog() > self.settings.max_output_backlog() {
            return;
        }

        let chunk_samples = self.settings.chunk_samples;
        let (result, position) = match self.cursor.as_mut() {
            Some(cursor) => {
                let result = cursor.read(chunk_samples);
                (result, cursor.position())
            }
            None => {
                self.settle_stopped();
                return;
            }
        };

        match result {
            Ok(outcome) => {
                if !outcome.samples.is_empty() {
                    if let Err(e) = self.output.push(&outcome.samples) {
                        self.report("audio output failed", &e);
                        self.next();
                        self.publish_status().await;
                        return;
                    }
                    self.broadcaster.broadcast_audio(&outcome.samples);
                }
                self.elapsed = position;

                if outcome.end_of_stream {
                    debug!("End of song at {:?}", position);
                    self.next();
                    self.publish_status().await;
                } else if self.status_due() {
                    self.publish_status().await;
                }
            }
            Err(Error::Truncated(msg)) if self.restarts < self.settings.max_restarts => {
                warn!("Song truncated ({}), restarting", msg);
                let index = self.queue.index();
                let restarts = self.restarts + 1;
                self.stop();
                self.queue.set_index(index);
                self.play();
                if self.queue.index() == index && self.cursor.is_some() {
                    self.restarts = restarts;
                }
                self.publish_status().await;
            }
            Err(e) => {
                self.report("decode failed", &e);
                self.next();
                self.publish_status().await;
            }
        }
    }
}
