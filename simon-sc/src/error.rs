//! Error types for simon-sc
//!
//! Module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the score collector
#[derive(Error, Debug)]
pub enum Error {
    /// Broker connection or publish errors
    #[error("Broker error: {0}")]
    Broker(String),

    /// Score log storage errors
    #[error("Store error: {0}")]
    Store(#[from] simon_common::Error),

    /// Payload serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rumqttc::ClientError> for Error {
    fn from(e: rumqttc::ClientError) -> Self {
        Error::Broker(e.to_string())
    }
}

/// Convenience Result type using simon-sc Error
pub type Result<T> = std::result::Result<T, Error>;
