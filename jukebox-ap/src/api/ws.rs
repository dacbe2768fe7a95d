//! WebSocket observer and audio listener endpoints

use super::server::AppContext;
use crate::playback::ChannelObserver;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// GET /ws - JSON text frame per event
pub async fn observer_socket(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| serve_observer(socket, ctx))
}

async fn serve_observer(socket: WebSocket, ctx: AppContext) {
    let (observer, mut rx) = ChannelObserver::new(
        ctx.settings.listener_capacity,
        ctx.settings.observer_send_timeout(),
    );
    let id = match ctx.engine.add_observer(Arc::new(observer)).await {
        Ok(id) => id,
        Err(e) => {
            warn!("WebSocket observer not registered: {}", e);
            return;
        }
    };
    debug!("WebSocket observer {} connected", id);

    let (mut sink, mut incoming) = socket.split();
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&*event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!("WebSocket observer {} disconnected", id);
    let _ = ctx.engine.remove_observer(id).await;
}

/// GET /ws/audio - binary frames of little-endian f32 samples
pub async fn audio_socket(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| serve_listener(socket, ctx))
}

async fn serve_listener(socket: WebSocket, ctx: AppContext) {
    let (tx, mut rx) = mpsc::channel(ctx.settings.listener_capacity.max(1));
    let id = match ctx.engine.add_listener(tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Audio listener not registered: {}", e);
            return;
        }
    };
    debug!("Audio listener {} connected", id);

    let (mut sink, mut incoming) = socket.split();
    loop {
        tokio::select! {
            chunk = rx.recv() => {
                let Some(chunk) = chunk else { break };
                if sink.send(Message::Binary(encode_samples(&chunk))).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!("Audio listener {} disconnected", id);
    let _ = ctx.engine.remove_listener(id).await;
}

/// Interleaved samples as little-endian f32 bytes
pub fn encode_samples(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
