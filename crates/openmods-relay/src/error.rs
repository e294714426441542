//! Publisher error types

use thiserror::Error;

/// Errors from a single delivery attempt to one relay.
#[derive(Error, Debug)]
pub enum SendError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The relay answered OK with `accepted = false`
    #[error("Relay rejected event: {0}")]
    Rejected(String),

    /// Malformed relay message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The relay closed the connection before acknowledging
    #[error("Connection closed by relay")]
    ConnectionClosed,
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, SendError>;
