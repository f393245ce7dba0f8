use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::headers::{self, ACCEPT, CACHE_CONTROL, LAST_EVENT_ID, NO_CACHE, TEXT_EVENT_STREAM};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Namespace prefixed to every persisted last-event-id key.
pub const LAST_EVENT_ID_NAMESPACE: &str = "sse_client.last_event_id";

/// How a feed reacts to failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SseStrategy {
    /// Retry after every error, ignoring connectivity.
    #[default]
    RetryOnError,
    /// Stop while the network is unreachable and restart once it is back.
    RetryOnConnectivity,
}

/// Immutable description of one feed.
///
/// Setters consume and return the value, so deriving a variant from a shared
/// config is `config.clone().with_header(..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    url: Url,
    headers: HashMap<String, String>,
    retry_delay: Duration,
    strategy: SseStrategy,
}

impl RequestConfig {
    /// Parse and validate the feed URL. Only `http` and `https` are accepted.
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Self::from_url(parsed)
    }

    pub fn from_url(url: Url) -> Result<Self, ConfigError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        Ok(Self {
            url,
            headers: HashMap::new(),
            retry_delay: DEFAULT_RETRY_DELAY,
            strategy: SseStrategy::default(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        headers::get_header(&self.headers, key)
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn strategy(&self) -> SseStrategy {
        self.strategy
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: SseStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Add or replace one header.
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, ConfigError> {
        if !headers::is_valid_header(key, value) {
            return Err(ConfigError::InvalidHeader(key.to_string()));
        }
        headers::set_header(&mut self.headers, key, value);
        Ok(self)
    }

    /// Add or replace several headers.
    pub fn with_headers(mut self, extra: &HashMap<String, String>) -> Result<Self, ConfigError> {
        for (k, v) in extra {
            self = self.with_header(k, v)?;
        }
        Ok(self)
    }

    /// Derived copy carrying the protocol headers. `Accept` and
    /// `Cache-Control` always override caller values; `Last-Event-Id` is only
    /// set when an id is known.
    #[must_use]
    pub fn with_default_params(&self, last_event_id: Option<&str>) -> Self {
        let mut derived = self.clone();
        headers::set_header(&mut derived.headers, ACCEPT, TEXT_EVENT_STREAM);
        headers::set_header(&mut derived.headers, CACHE_CONTROL, NO_CACHE);
        if let Some(id) = last_event_id {
            if headers::is_valid_header(LAST_EVENT_ID, id) {
                headers::set_header(&mut derived.headers, LAST_EVENT_ID, id);
            } else {
                tracing::warn!(id, "Stored last event id is not a valid header value, skipping");
            }
        }
        derived
    }

    /// `scheme.host.port.path` of the feed URL. The port is 0 unless the URL
    /// names one explicitly.
    pub fn url_identity(&self) -> String {
        url_identity(&self.url)
    }

    /// Persistence key for the last event id of this feed.
    pub fn last_event_id_key(&self) -> String {
        format!("{LAST_EVENT_ID_NAMESPACE}.{}", self.url_identity())
    }
}

pub fn url_identity(url: &Url) -> String {
    format!(
        "{}.{}.{}.{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port().unwrap_or(0),
        url.path()
    )
}
