//! HTTP server setup and routing

use crate::config::EngineSettings;
use crate::error::{Error, Result};
use crate::playback::PlaybackEngine;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: PlaybackEngine,
    pub state: Arc<SharedState>,
    /// Observer and listener buffering
    pub settings: EngineSettings,
}

impl AppContext {
    pub fn new(engine: PlaybackEngine, settings: EngineSettings) -> Self {
        Self {
            state: Arc::clone(engine.state()),
            engine,
            settings,
        }
    }
}

/// Build the router with every route
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Published snapshots
        .route("/api/status", get(super::handlers::get_status))
        .route("/api/queue", get(super::handlers::get_queue))
        .route("/api/playlists", get(super::handlers::get_playlists))
        .route("/api/sources", get(super::handlers::get_sources))
        .route("/api/tracks", get(super::handlers::get_tracks))
        .route("/api/protocols", get(super::handlers::get_protocols))
        .route("/api/song/info", get(super::handlers::get_song_info))

        // Transport commands (play, stop, next, prev, pause, random,
        // repeat, play_index, seek)
        .route("/api/cmd/:name", post(super::handlers::command))

        // Queue and playlist edits
        .route("/api/queue/change", post(super::handlers::change_queue))
        .route("/api/playlist/change", post(super::handlers::change_playlist))

        // Source instances
        .route("/api/source/add", post(super::handlers::add_source))
        .route("/api/source/remove", post(super::handlers::remove_source))
        .route("/api/source/refresh", post(super::handlers::refresh_source))

        // Observers and listeners
        .route("/events", get(super::sse::event_stream))
        .route("/ws", get(super::ws::observer_socket))
        .route("/ws/audio", get(super::ws::audio_socket))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
