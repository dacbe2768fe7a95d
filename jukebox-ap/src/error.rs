//! Error types for jukebox-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for jukebox-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Stream ended before its declared length
    ///
    /// The engine restarts the song from the top when it sees this.
    #[error("Stream truncated: {0}")]
    Truncated(String),

    /// No registered codec recognised the stream
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// Song has no known duration
    #[error("Seek unsupported: {0}")]
    SeekUnsupported(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Source collaborator errors (listing, lookup, resolution)
    #[error("Source error: {0}")]
    Source(String),

    /// Malformed song id
    #[error("Invalid song id: {0}")]
    InvalidSongId(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Playback engine has shut down
    #[error("Playback engine unavailable")]
    EngineUnavailable,

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jukebox_common::Error> for Error {
    fn from(err: jukebox_common::Error) -> Self {
        match err {
            jukebox_common::Error::Io(e) => Error::Io(e),
            jukebox_common::Error::Config(msg) => Error::Config(msg),
            jukebox_common::Error::NotFound(msg) => Error::NotFound(msg),
            jukebox_common::Error::InvalidInput(msg) => Error::InvalidSongId(msg),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<symphonia::core::errors::Error> for Error {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymError;
        match err {
            SymError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::Truncated(e.to_string())
            }
            SymError::Unsupported(what) => Error::UnrecognizedFormat(what.to_string()),
            other => Error::Decode(other.to_string()),
        }
    }
}

impl Error {
    /// Whether the error was caused by the caller rather than the engine
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::BadRequest(_) | Error::InvalidSongId(_))
    }
}

/// Convenience Result type using jukebox-ap Error
pub type Result<T> = std::result::Result<T, Error>;
