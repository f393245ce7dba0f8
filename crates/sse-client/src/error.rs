use sse_core::ConfigError;
use thiserror::Error;

/// Any way a connection attempt can end other than consumer cancellation.
/// Every variant is a reconnect trigger.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Data transfer completed, resubscribing")]
    CompletedWithoutError,

    #[error("Transport closed without reporting completion")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SseError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for SseError {
    fn from(s: String) -> Self {
        SseError::Other(s)
    }
}

impl From<&str> for SseError {
    fn from(s: &str) -> Self {
        SseError::Other(s.to_string())
    }
}
