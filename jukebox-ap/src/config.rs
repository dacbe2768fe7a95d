//! Configuration for the jukebox audio player
//!
//! Bootstrap settings come from a TOML file (see
//! [`jukebox_common::config`] for how the file is located), then command-line
//! overrides are applied on top:
//!
//! 1. Command-line arguments / environment variables (clap)
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to SQLite database file (`:memory:` keeps state in RAM only)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Audio output backend
    #[serde(default)]
    pub output: OutputKind,

    /// Directory registered as a `file` source at startup
    #[serde(default)]
    pub music_dir: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Playback engine tuning
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: default_database_path(),
            output: OutputKind::default(),
            music_dir: None,
            logging: LoggingConfig::default(),
            engine: EngineSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Audio output backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// System audio device via cpal
    #[default]
    Cpal,
    /// Discard audio (headless)
    Null,
}

/// Playback engine tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Interleaved samples pulled per tick
    pub chunk_samples: usize,
    /// Minimum spacing of status broadcasts while playing
    pub status_interval_ms: u64,
    /// Debounce delay before a dirty state is saved
    pub save_delay_ms: u64,
    /// `prev` goes back an extra song when elapsed is below this
    pub prev_restart_threshold_ms: u64,
    /// Per-observer delivery timeout before it is dropped
    pub observer_send_timeout_ms: u64,
    /// Audio chunks buffered per listener before frames are dropped
    pub listener_capacity: usize,
    /// Ticks are skipped while the output holds more than this
    pub max_output_backlog_ms: u64,
    /// Command channel capacity
    pub command_capacity: usize,
    /// Truncation restarts allowed for one song before advancing
    pub max_restarts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_samples: 4096,
            status_interval_ms: 500,
            save_delay_ms: 1000,
            prev_restart_threshold_ms: 3000,
            observer_send_timeout_ms: 5000,
            listener_capacity: 64,
            max_output_backlog_ms: 250,
            command_capacity: 256,
            max_restarts: 1,
        }
    }
}

impl EngineSettings {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    pub fn prev_restart_threshold(&self) -> Duration {
        Duration::from_millis(self.prev_restart_threshold_ms)
    }

    pub fn observer_send_timeout(&self) -> Duration {
        Duration::from_millis(self.observer_send_timeout_ms)
    }

    pub fn max_output_backlog(&self) -> Duration {
        Duration::from_millis(self.max_output_backlog_ms)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_samples == 0 {
            return Err(Error::Config("engine.chunk_samples must be > 0".to_string()));
        }
        if self.command_capacity == 0 || self.listener_capacity == 0 {
            return Err(Error::Config(
                "engine channel capacities must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    6601
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> PathBuf {
    jukebox_common::config::default_data_dir().join("jukebox.db")
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub music_dir: Option<PathBuf>,
    pub output: Option<OutputKind>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub output: OutputKind,
    pub music_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub engine: EngineSettings,
}

impl Config {
    /// Load the TOML file (defaults if absent) and apply overrides
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config: TomlConfig = jukebox_common::config::load_toml(toml_path)?;
        let config = Self::from_parts(toml_config, overrides);
        config.engine.validate()?;

        info!(
            "Configuration: port={}, database={}, output={:?}",
            config.port,
            config.database_path.display(),
            config.output
        );
        Ok(config)
    }

    pub fn from_parts(toml_config: TomlConfig, overrides: ConfigOverrides) -> Self {
        Self {
            port: overrides.port.unwrap_or(toml_config.port),
            database_path: overrides.database_path.unwrap_or(toml_config.database_path),
            output: overrides.output.unwrap_or(toml_config.output),
            music_dir: overrides.music_dir.or(toml_config.music_dir),
            logging: toml_config.logging,
            engine: toml_config.engine,
        }
    }

    /// Whether state should stay in memory only
    pub fn in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}
