//! HTTP, SSE and WebSocket transport
//!
//! Thin layer over the playback engine: commands go through the engine
//! handle, read-only queries read the published [`SharedState`](crate::state::SharedState).

pub mod handlers;
pub mod server;
pub mod sse;
pub mod ws;

pub use server::{build_router, run, AppContext};
