//! Playback engine
//!
//! **Module Structure:**
//! - `actor.rs`: actor state, command loop, publication, persistence
//! - `playback.rs`: transport (play, stop, next, prev, pause, seek, tick)
//! - `library.rs`: queue, playlist and source commands
//! - `handle.rs`: the cloneable [`PlaybackEngine`] handle
//! - `commands.rs`: the actor's message type

mod commands;
mod actor;
mod handle;
mod library;
mod playback;

pub use commands::Command;
pub use actor::EngineParts;
pub use handle::PlaybackEngine;
