//! Error types for bigring-vp
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the bigring-vp video player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Route model and catalog errors
    #[error(transparent)]
    Common(#[from] bigring_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Video decoding errors
    #[error("Video decode error: {0}")]
    Decode(String),

    /// Video file could not be opened; fatal to the current session
    #[error("Cannot open video {}: {reason}", path.display())]
    DecodeOpenFailed { path: PathBuf, reason: String },

    /// Playback controller errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using bigring-vp Error
pub type Result<T> = std::result::Result<T, Error>;
