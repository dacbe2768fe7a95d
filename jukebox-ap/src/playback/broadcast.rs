//! Broadcast fan-out to observers and audio listeners
//!
//! Observers get every status/data event. Each observer has its own delivery
//! task fed by an unbounded queue, so the actor never waits on a slow client
//! and each observer still sees events in order. A failed delivery feeds
//! [`Command::RemoveObserver`] back into the actor.
//!
//! Audio listeners get raw sample chunks through bounded channels. A full
//! channel drops the chunk for that listener only.

use super::engine::Command;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::JukeboxEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub type ObserverId = Uuid;
pub type ListenerId = Uuid;

/// Chunk of interleaved samples shared between listeners
pub type AudioChunk = Arc<[f32]>;

/// A connection interested in status/data snapshots
#[async_trait]
pub trait Observer: Send + Sync {
    /// Deliver one event; an error unregisters the observer
    async fn deliver(&self, event: Arc<JukeboxEvent>) -> Result<()>;
}

/// Observer backed by a bounded channel, drained by a transport task
pub struct ChannelObserver {
    tx: mpsc::Sender<Arc<JukeboxEvent>>,
    timeout: Duration,
}

impl ChannelObserver {
    /// Create the observer and the receiver its transport reads from
    pub fn new(capacity: usize, timeout: Duration) -> (Self, mpsc::Receiver<Arc<JukeboxEvent>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, timeout }, rx)
    }
}

#[async_trait]
impl Observer for ChannelObserver {
    async fn deliver(&self, event: Arc<JukeboxEvent>) -> Result<()> {
        self.tx
            .send_timeout(event, self.timeout)
            .await
            .map_err(|e| Error::Http(format!("observer delivery failed: {}", e)))
    }
}

/// Registration sets, owned by the playback actor
pub struct Broadcaster {
    observers: HashMap<ObserverId, mpsc::UnboundedSender<Arc<JukeboxEvent>>>,
    listeners: HashMap<ListenerId, mpsc::Sender<AudioChunk>>,
    dropped_chunks: u64,
    commands: mpsc::WeakSender<Command>,
}

impl Broadcaster {
    /// `commands` is the actor's own inbox, used to report failed observers
    pub fn new(commands: mpsc::WeakSender<Command>) -> Self {
        Self {
            observers: HashMap::new(),
            listeners: HashMap::new(),
            dropped_chunks: 0,
            commands,
        }
    }

    /// Register an observer and start its delivery task
    pub fn add_observer(&mut self, id: ObserverId, observer: Arc<dyn Observer>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<JukeboxEvent>>();
        let commands = self.commands.clone();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = observer.deliver(event).await {
                    debug!("Observer {} failed: {}", id, e);
                    if let Some(commands) = commands.upgrade() {
                        let _ = commands.send(Command::RemoveObserver(id)).await;
                    }
                    break;
                }
            }
        });

        self.observers.insert(id, tx);
        debug!("Observer {} registered ({} total)", id, self.observers.len());
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            debug!("Observer {} removed ({} left)", id, self.observers.len());
        }
        removed
    }

    /// Queue an event for one observer only
    pub fn send_to(&self, id: ObserverId, event: Arc<JukeboxEvent>) {
        if let Some(tx) = self.observers.get(&id) {
            let _ = tx.send(event);
        }
    }

    /// Queue an event for every observer
    pub fn broadcast(&self, event: JukeboxEvent) {
        let event = Arc::new(event);
        for tx in self.observers.values() {
            // A closed queue means the delivery task already reported failure
            let _ = tx.send(Arc::clone(&event));
        }
    }

    pub fn add_listener(&mut self, id: ListenerId, tx: mpsc::Sender<AudioChunk>) {
        self.listeners.insert(id, tx);
        debug!("Audio listener {} registered", id);
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Offer a chunk to every listener without waiting
    pub fn broadcast_audio(&mut self, samples: &[f32]) {
        if self.listeners.is_empty() {
            return;
        }
        let chunk: AudioChunk = Arc::from(samples);
        let mut closed = Vec::new();

        for (id, tx) in &self.listeners {
            match tx.try_send(Arc::clone(&chunk)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped_chunks += 1;
                    if self.dropped_chunks % 100 == 1 {
                        warn!("Audio listener {} lagging ({} chunks dropped)", id, self.dropped_chunks);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            self.listeners.remove(&id);
            debug!("Audio listener {} disconnected", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Chunks dropped across all listeners since startup
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingObserver {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Observer for FailingObserver {
        async fn deliver(&self, _event: Arc<JukeboxEvent>) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Http("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_observer_requests_removal() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let mut broadcaster = Broadcaster::new(cmd_tx.downgrade());

        let id = Uuid::new_v4();
        let observer = Arc::new(FailingObserver {
            attempts: AtomicUsize::new(0),
        });
        broadcaster.add_observer(id, observer.clone());
        broadcaster.broadcast(JukeboxEvent::error("first"));

        match cmd_rx.recv().await {
            Some(Command::RemoveObserver(removed)) => assert_eq!(removed, id),
            _ => panic!("expected RemoveObserver"),
        }
        assert_eq!(observer.attempts.load(Ordering::SeqCst), 1);
        assert!(broadcaster.remove_observer(id));
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_observer_receives_in_order() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(8);
        let mut broadcaster = Broadcaster::new(cmd_tx.downgrade());
        let (observer, mut rx) = ChannelObserver::new(16, Duration::from_secs(1));

        let id = Uuid::new_v4();
        broadcaster.add_observer(id, Arc::new(observer));
        for i in 0..5 {
            broadcaster.broadcast(JukeboxEvent::error(format!("e{}", i)));
        }

        for i in 0..5 {
            let event = rx.recv().await.unwrap();
            match event.as_ref() {
                JukeboxEvent::Error { message, .. } => assert_eq!(message, &format!("e{}", i)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_channel_observer_times_out() {
        let (observer, _rx) = ChannelObserver::new(1, Duration::from_millis(100));
        observer.deliver(Arc::new(JukeboxEvent::error("a"))).await.unwrap();
        // Channel full and nobody reading
        assert!(observer.deliver(Arc::new(JukeboxEvent::error("b"))).await.is_err());
    }

    #[tokio::test]
    async fn test_full_listener_drops_without_blocking() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(8);
        let mut broadcaster = Broadcaster::new(cmd_tx.downgrade());

        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        broadcaster.add_listener(Uuid::new_v4(), fast_tx);
        broadcaster.add_listener(Uuid::new_v4(), slow_tx);

        broadcaster.broadcast_audio(&[0.1, 0.2]);
        broadcaster.broadcast_audio(&[0.3, 0.4]);

        assert_eq!(broadcaster.dropped_chunks(), 1);
        assert_eq!(&*fast_rx.recv().await.unwrap(), &[0.1, 0.2]);
        assert_eq!(&*fast_rx.recv().await.unwrap(), &[0.3, 0.4]);
        assert_eq!(&*slow_rx.recv().await.unwrap(), &[0.1, 0.2]);
        assert!(slow_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_listener_is_removed() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(8);
        let mut broadcaster = Broadcaster::new(cmd_tx.downgrade());

        let (tx, rx) = mpsc::channel(4);
        broadcaster.add_listener(Uuid::new_v4(), tx);
        drop(rx);

        broadcaster.broadcast_audio(&[0.0]);
        assert_eq!(broadcaster.listener_count(), 0);
    }
}
