//! Server-Sent Events observer
//!
//! Each connection registers a [`ChannelObserver`] with the engine and
//! streams what it receives. The engine drops the observer when the client
//! goes away (its channel closes) or stops reading.

use super::server::AppContext;
use crate::playback::ChannelObserver;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use jukebox_common::JukeboxEvent;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (observer, rx) = ChannelObserver::new(
        ctx.settings.listener_capacity,
        ctx.settings.observer_send_timeout(),
    );

    let events = match ctx.engine.add_observer(Arc::new(observer)).await {
        Ok(id) => {
            debug!("SSE observer {} connected", id);
            ReceiverStream::new(rx).boxed()
        }
        Err(e) => {
            warn!("SSE observer not registered: {}", e);
            stream::empty::<Arc<JukeboxEvent>>().boxed()
        }
    };

    let stream = events.filter_map(|event| async move {
        match serde_json::to_string(&*event) {
            Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
