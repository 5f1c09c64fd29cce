//! Common error types for Veil.

use thiserror::Error;

/// Result type alias using Veil's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for relay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket upgrade, read or write failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Session store or pub/sub collaborator failure
    #[error("handler error: {0}")]
    Handler(String),

    /// Malformed client message
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a connection error from any displayable type.
    pub fn connection(msg: impl std::fmt::Display) -> Self {
        Self::Connection(msg.to_string())
    }

    /// Create a handler error from any displayable type.
    pub fn handler(msg: impl std::fmt::Display) -> Self {
        Self::Handler(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }
}
