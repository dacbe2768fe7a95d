//! Durable state storage
//!
//! The playback engine persists one [`PersistedState`] snapshot. Production
//! uses SQLite ([`SqliteStore`]); `:memory:` databases and tests can use
//! [`MemoryStore`].

pub mod settings;

use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebox_common::PersistedState;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info};

/// Settings key under which the snapshot is stored
pub const STATE_KEY: &str = "jukebox_state";

/// Where the engine loads and saves its durable state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last saved snapshot, `None` on first run
    async fn load(&self) -> Result<Option<PersistedState>>;

    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// SQLite-backed store using the `settings` key-value table
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and its schema
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| Error::Config(format!("Invalid database path: {}", path.display())))?;
        let options = SqliteConnectOptions::from_str(path_str)?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        info!("Opened state database: {}", path.display());
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        settings::create_settings_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        let Some(json) = settings::get_setting::<String>(&self.pool, STATE_KEY).await? else {
            return Ok(None);
        };
        let state = PersistedState::from_json(&json)
            .map_err(|e| Error::Config(format!("Stored state is unreadable: {}", e)))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        let json = state.to_json()?;
        settings::set_setting(&self.pool, STATE_KEY, json).await?;
        debug!("Saved state ({} queued, {} playlists)", state.queue.len(), state.playlists.len());
        Ok(())
    }
}

/// Store that keeps the snapshot in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, as if a previous run had saved `state`
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// Last saved snapshot
    pub fn snapshot(&self) -> Option<PersistedState> {
        self.state.lock().ok().and_then(|s| s.clone())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))?;
        *guard = Some(state.clone());
        Ok(())
    }
}
