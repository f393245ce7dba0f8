use thiserror::Error;

/// Raised when a feed cannot be configured. Always surfaced before any
/// connection attempt is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}
