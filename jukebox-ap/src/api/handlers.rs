//! HTTP request handlers
//!
//! Commands go through the engine handle; everything under `GET /api/*`
//! reads the snapshots the actor last published.

use super::server::AppContext;
use crate::error::Error;
use crate::playback::QueueChange;
use crate::source::SourceKind;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use jukebox_common::{Playlist, PlaylistSet, SongId, SongInfo, StatusSnapshot, TrackEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }
}

/// Optional body of `POST /api/cmd/:name`
#[derive(Debug, Default, Deserialize)]
pub struct CommandBody {
    pub index: Option<usize>,
    pub position_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangeResponse {
    /// Per-item notes; the change itself was applied
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistChangeRequest {
    pub name: String,
    #[serde(flatten)]
    pub change: QueueChange,
}

#[derive(Debug, Deserialize)]
pub struct SourceAddRequest {
    pub protocol: String,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceAddResponse {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceRequest {
    pub protocol: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SongQuery {
    pub song: String,
}

/// Error half of every fallible handler
pub type ApiError = (StatusCode, Json<StatusResponse>);

/// Map an engine error to a status code and message
pub fn api_error(err: Error) -> ApiError {
    let code = match &err {
        e if e.is_caller_error() => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::SeekUnsupported(_) => StatusCode::CONFLICT,
        Error::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", err),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "jukebox-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Snapshot Endpoints
// ============================================================================

pub async fn get_status(State(ctx): State<AppContext>) -> Json<StatusSnapshot> {
    Json(ctx.state.get_status().await)
}

pub async fn get_queue(State(ctx): State<AppContext>) -> Json<Playlist> {
    Json(ctx.state.get_queue().await)
}

pub async fn get_playlists(State(ctx): State<AppContext>) -> Json<PlaylistSet> {
    Json(ctx.state.get_playlists().await)
}

pub async fn get_sources(State(ctx): State<AppContext>) -> Json<BTreeMap<String, Vec<String>>> {
    Json(ctx.state.get_sources().await)
}

pub async fn get_tracks(State(ctx): State<AppContext>) -> Json<Vec<TrackEntry>> {
    Json(ctx.state.get_tracks().await)
}

/// GET /api/protocols - source kinds and their parameters
pub async fn get_protocols(State(ctx): State<AppContext>) -> Json<BTreeMap<String, SourceKind>> {
    Json(ctx.engine.registry().describe())
}

/// GET /api/song/info?song=<id>
pub async fn get_song_info(
    State(ctx): State<AppContext>,
    Query(query): Query<SongQuery>,
) -> Result<Json<SongInfo>, ApiError> {
    let id: SongId = query.song.parse().map_err(|e| api_error(Error::from(e)))?;
    ctx.state
        .song_info(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(Error::NotFound(format!("unknown song: {}", id))))
}

// ============================================================================
// Transport Commands
// ============================================================================

/// POST /api/cmd/:name
pub async fn command(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    body: Option<Json<CommandBody>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let engine = &ctx.engine;

    let result = match name.as_str() {
        "play" => engine.play().await,
        "stop" => engine.stop().await,
        "next" => engine.next().await,
        "prev" => engine.prev().await,
        "pause" => engine.pause().await,
        "random" => engine.toggle_random().await,
        "repeat" => engine.toggle_repeat().await,
        "play_index" => match body.index {
            Some(index) => engine.play_index(index).await,
            None => Err(Error::BadRequest("play_index needs an index".to_string())),
        },
        "seek" => match body.position_ms {
            Some(ms) => engine.seek(Duration::from_millis(ms)).await,
            None => Err(Error::BadRequest("seek needs position_ms".to_string())),
        },
        other => Err(Error::BadRequest(format!("unknown command: {}", other))),
    };

    result.map_err(api_error)?;
    info!("Command {} accepted", name);
    Ok(StatusResponse::ok())
}

// ============================================================================
// Queue and Playlist Edits
// ============================================================================

/// POST /api/queue/change
pub async fn change_queue(
    State(ctx): State<AppContext>,
    Json(change): Json<QueueChange>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let errors = ctx.engine.change_queue(change).await.map_err(api_error)?;
    Ok(Json(ChangeResponse { errors }))
}

/// POST /api/playlist/change
pub async fn change_playlist(
    State(ctx): State<AppContext>,
    Json(request): Json<PlaylistChangeRequest>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let errors = ctx
        .engine
        .change_playlist(request.name, request.change)
        .await
        .map_err(api_error)?;
    Ok(Json(ChangeResponse { errors }))
}

// ============================================================================
// Source Instances
// ============================================================================

/// POST /api/source/add
pub async fn add_source(
    State(ctx): State<AppContext>,
    Json(request): Json<SourceAddRequest>,
) -> Result<Json<SourceAddResponse>, ApiError> {
    let key = ctx
        .engine
        .add_source(request.protocol, request.params)
        .await
        .map_err(api_error)?;
    Ok(Json(SourceAddResponse { key }))
}

/// POST /api/source/remove
pub async fn remove_source(
    State(ctx): State<AppContext>,
    Json(request): Json<SourceRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine
        .remove_source(request.protocol, request.key)
        .await
        .map_err(api_error)?;
    Ok(StatusResponse::ok())
}

/// POST /api/source/refresh
pub async fn refresh_source(
    State(ctx): State<AppContext>,
    Json(request): Json<SourceRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine
        .refresh_source(request.protocol, request.key)
        .await
        .map_err(api_error)?;
    Ok(StatusResponse::ok())
}
