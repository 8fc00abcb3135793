//! Common error types for the Simon bridge

use thiserror::Error;

/// Common result type for Simon bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Simon bridge services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization error (wraps serde_json::Error)
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
