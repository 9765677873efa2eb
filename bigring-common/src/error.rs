//! Common error types for Big Ring

use thiserror::Error;

/// Common result type for Big Ring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the route model and the player
#[derive(Error, Debug)]
pub enum Error {
    /// Query against a route without distance mapping or courses
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error for route catalogs
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or malformed route definition
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
