//! Bootstrap configuration file resolution and loading
//!
//! Config file location priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. OS-dependent default (`<config dir>/jukebox/config.toml`)
//!
//! A missing file is not an error: callers get `Default::default()` and a
//! warning is logged.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "JUKEBOX_CONFIG";

/// Resolve which config file to read
///
/// Returns `None` only when no CLI argument or environment variable is set
/// and the platform has no config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_file()
}

/// OS-dependent default config file path
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jukebox").join("config.toml"))
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("jukebox"))
        .unwrap_or_else(|| PathBuf::from("./jukebox_data"))
}

/// Load a TOML config, falling back to defaults when the file is absent
///
/// A file that exists but cannot be parsed is an error.
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No config file location available, using defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
