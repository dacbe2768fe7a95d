//! HTTP API integration tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`
//! against an engine backed by fake sources.

#[allow(dead_code)]
mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::{test_settings, FakeCatalog, TestEngine, TrackSpec, FAKE_KIND};
use jukebox_ap::api::{build_router, AppContext};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Router plus the engine behind it
async fn setup(catalog: FakeCatalog) -> (Router, TestEngine) {
    let t = TestEngine::start(catalog).await;
    let ctx = AppContext::new(t.engine.clone(), test_settings());
    (build_router(ctx), t)
}

/// Helper to make HTTP requests to the app
async fn make_request(
    app: &Router,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let request = if let Some(json_body) = body {
        Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json = if body_bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&body_bytes).ok()
    };

    (status, body_json)
}

#[tokio::test(start_paused = true)]
async fn test_health_endpoint() {
    let (app, _t) = setup(FakeCatalog::new()).await;

    let (status, body) = make_request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let body = body.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "jukebox-ap");
    assert!(body["version"].is_string());
    assert!(body["git_hash"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_status_starts_stopped() {
    let (app, _t) = setup(FakeCatalog::new()).await;

    let (status, body) = make_request(&app, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["state"], "stopped");
    assert_eq!(body["queue_len"], 0);
    assert!(body["song"].is_null());
}

#[tokio::test(start_paused = true)]
async fn test_queue_change_then_play() {
    let (app, t) = setup(FakeCatalog::new().tones(2, 60_000)).await;

    let (status, body) = make_request(
        &app,
        "POST",
        "/api/queue/change",
        Some(json!({
            "add": [t.catalog.id("t0"), t.catalog.id("t1"), "garbage"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["errors"].as_array().unwrap().len(), 1);

    let (_, body) = make_request(&app, "GET", "/api/queue", None).await;
    assert_eq!(body.unwrap(), json!([t.catalog.id("t0"), t.catalog.id("t1")]));

    let (status, body) = make_request(&app, "POST", "/api/cmd/play", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");

    // Commands are processed in order; status is a barrier
    t.engine.status().await.unwrap();
    let (_, body) = make_request(&app, "GET", "/api/status", None).await;
    let body = body.unwrap();
    assert_eq!(body["state"], "playing");
    assert_eq!(body["song"], t.catalog.id("t0"));

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/cmd/play_index",
        Some(json!({ "index": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    t.engine.status().await.unwrap();
    let (_, body) = make_request(&app, "GET", "/api/status", None).await;
    assert_eq!(body.unwrap()["index"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_rejected() {
    let (app, _t) = setup(FakeCatalog::new()).await;

    let (status, body) = make_request(&app, "POST", "/api/cmd/rewind", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.unwrap()["status"]
        .as_str()
        .unwrap()
        .contains("unknown command"));

    let (status, _) = make_request(&app, "POST", "/api/cmd/play_index", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_seek_errors() {
    let catalog = FakeCatalog::new().track("live", TrackSpec::tone("live", 60_000).unknown_duration());
    let (app, t) = setup(catalog).await;

    // Nothing loaded
    let (status, _) = make_request(&app, "POST", "/api/cmd/seek", Some(json!({ "position_ms": 1000 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    t.enqueue(&["live"]).await;
    t.engine.play().await.unwrap();
    let (status, _) = make_request(&app, "POST", "/api/cmd/seek", Some(json!({ "position_ms": 1000 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_song_info() {
    let (app, t) = setup(FakeCatalog::new().tones(1, 2500)).await;
    t.wait_for_tracks(1).await;

    let (status, _) = make_request(&app, "GET", "/api/song/info?song=nonsense", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(&app, "GET", "/api/song/info?song=fake%7Cother%7Ct0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!(
        "/api/song/info?song={}",
        t.catalog.id("t0").replace('|', "%7C")
    );
    let (status, body) = make_request(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["title"], "t0");
    assert_eq!(body["duration_ms"], 2500);
}

#[tokio::test(start_paused = true)]
async fn test_sources_and_protocols() {
    let (app, t) = setup(FakeCatalog::new().tones(2, 1000)).await;

    let (status, body) = make_request(&app, "GET", "/api/protocols", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["file"]["params"], json!(["directory"]));
    assert_eq!(body[FAKE_KIND]["params"], json!(["name"]));

    let (_, body) = make_request(&app, "GET", "/api/sources", None).await;
    assert_eq!(body.unwrap()[FAKE_KIND], json!([t.catalog.name]));

    t.wait_for_tracks(2).await;
    let (_, body) = make_request(&app, "GET", "/api/tracks", None).await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 2);

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/source/add",
        Some(json!({ "protocol": "gopher", "params": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/source/refresh",
        Some(json!({ "protocol": FAKE_KIND, "key": t.catalog.name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/source/remove",
        Some(json!({ "protocol": FAKE_KIND, "key": t.catalog.name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/source/remove",
        Some(json!({ "protocol": FAKE_KIND, "key": t.catalog.name })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_add_file_source_over_http() {
    let dir = tempfile::tempdir().unwrap();
    helpers::audio_generator::generate_tone(dir.path().join("a.wav"), 200).unwrap();
    let (app, _t) = setup(FakeCatalog::new()).await;

    let (status, body) = make_request(
        &app,
        "POST",
        "/api/source/add",
        Some(json!({ "protocol": "file", "params": [dir.path().to_string_lossy()] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let key = body.unwrap()["key"].as_str().unwrap().to_string();
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(key, expected.to_string_lossy());

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/source/add",
        Some(json!({ "protocol": "file", "params": ["/definitely/not/here"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_playlist_change_endpoint() {
    let (app, t) = setup(FakeCatalog::new().tones(2, 1000)).await;

    let (status, body) = make_request(
        &app,
        "POST",
        "/api/playlist/change",
        Some(json!({ "name": "mix", "add": [t.catalog.id("t1"), t.catalog.id("t0")] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["errors"], json!([]));

    let (_, body) = make_request(&app, "GET", "/api/playlists", None).await;
    assert_eq!(
        body.unwrap()["mix"],
        json!([t.catalog.id("t1"), t.catalog.id("t0")])
    );

    let (status, _) = make_request(
        &app,
        "POST",
        "/api/playlist/change",
        Some(json!({ "name": "", "add": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_engine_gone_is_unavailable() {
    let (app, t) = setup(FakeCatalog::new()).await;
    t.shutdown().await;

    let (status, _) = make_request(&app, "POST", "/api/cmd/play", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
