//! Jukebox Audio Player (jukebox-ap) - Main entry point
//!
//! Loads configuration, restores saved state, starts the playback engine and
//! serves the HTTP API until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_ap::api::{self, AppContext};
use jukebox_ap::audio::create_output;
use jukebox_ap::config::{Config, ConfigOverrides, OutputKind};
use jukebox_ap::db::{MemoryStore, SqliteStore, StateStore};
use jukebox_ap::playback::{EngineParts, PlaybackEngine};
use jukebox_ap::source::{file, SourceRegistry};
use jukebox_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use jukebox_common::PersistedState;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for jukebox-ap
#[derive(Parser, Debug)]
#[command(name = "jukebox-ap")]
#[command(about = "Networked jukebox audio player")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "JUKEBOX_PORT")]
    port: Option<u16>,

    /// Configuration file (falls back to JUKEBOX_CONFIG, then the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite state database (`:memory:` keeps state in RAM)
    #[arg(long, env = "JUKEBOX_DATABASE")]
    database: Option<PathBuf>,

    /// Directory to serve as a `file` source
    #[arg(long, env = "JUKEBOX_MUSIC_DIR")]
    music_dir: Option<PathBuf>,

    /// Audio output backend
    #[arg(long, value_enum, env = "JUKEBOX_OUTPUT")]
    output: Option<OutputKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = Config::load(
        config_path.as_deref(),
        ConfigOverrides {
            port: args.port,
            database_path: args.database,
            music_dir: args.music_dir,
            output: args.output,
        },
    )
    .context("Failed to load configuration")?;

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("jukebox_ap={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting jukebox-ap v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );
    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        _ => info!("No config file found, using defaults"),
    }

    // Open the state store and restore the previous run
    let store: Arc<dyn StateStore> = if config.in_memory() {
        info!("State kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            SqliteStore::open(&config.database_path)
                .await
                .context("Failed to open state database")?,
        )
    };
    let initial = match store.load().await {
        Ok(Some(state)) => {
            info!("Restored {} queued songs", state.queue.len());
            state
        }
        Ok(None) => PersistedState::default(),
        Err(e) => {
            warn!("Ignoring unreadable saved state: {}", e);
            PersistedState::default()
        }
    };

    // Initialize playback engine
    let (engine, engine_task) = PlaybackEngine::spawn(EngineParts {
        settings: config.engine.clone(),
        output: create_output(config.output),
        store,
        registry: Arc::new(SourceRegistry::with_defaults()),
        initial,
    });
    info!("Playback engine initialized (output: {:?})", config.output);

    if let Some(dir) = &config.music_dir {
        match engine
            .add_source(file::KIND.to_string(), vec![dir.display().to_string()])
            .await
        {
            Ok(key) => info!("Music directory: {}", key),
            Err(e) => warn!("Music directory {} not added: {}", dir.display(), e),
        }
    }

    // Stopping the engine ends every observer stream, which lets the
    // server's graceful shutdown complete
    let ctx = AppContext::new(engine.clone(), config.engine.clone());
    let shutdown_engine = engine.clone();
    let shutdown = async move {
        shutdown_signal().await;
        if let Err(e) = shutdown_engine.shutdown().await {
            warn!("Engine shutdown: {}", e);
        }
    };

    api::run(config.port, ctx, shutdown)
        .await
        .context("HTTP server failed")?;

    drop(engine);
    if let Err(e) = engine_task.await {
        error!("Playback engine task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
