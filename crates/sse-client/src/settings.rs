//! Client settings loaded from `settings.json`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sse_core::{RequestConfig, SseStrategy};

use crate::error::SseError;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Pause between a failed connection and the next attempt.
    pub retry_delay_ms: u64,

    pub strategy: SseStrategy,

    /// Batches buffered per feed before the stream applies backpressure.
    pub event_channel_capacity: usize,

    pub connect_timeout_ms: u64,

    pub probe_interval_ms: u64,

    pub probe_timeout_ms: u64,

    /// Extra request headers applied to every feed.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: sse_core::DEFAULT_RETRY_DELAY.as_millis() as u64,
            strategy: SseStrategy::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            connect_timeout_ms: crate::http::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            probe_interval_ms: crate::reachability::DEFAULT_PROBE_INTERVAL.as_millis() as u64,
            probe_timeout_ms: crate::reachability::DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            headers: HashMap::new(),
        }
    }
}

impl ClientSettings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SseError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SseError> {
        if self.event_channel_capacity == 0 {
            return Err("eventChannelCapacity must be greater than zero".into());
        }
        if self.probe_interval_ms == 0 {
            return Err("probeIntervalMs must be greater than zero".into());
        }
        for (key, value) in &self.headers {
            if !sse_core::headers::is_valid_header(key, value) {
                return Err(SseError::Config(sse_core::ConfigError::InvalidHeader(
                    key.clone(),
                )));
            }
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// `request` with these settings' retry delay, strategy and headers.
    /// Headers already on the request win over configured ones.
    pub fn apply(&self, request: RequestConfig) -> Result<RequestConfig, SseError> {
        let mut headers = self.headers.clone();
        sse_core::headers::merge_headers(&mut headers, request.headers());
        Ok(request
            .with_retry_delay(self.retry_delay())
            .with_strategy(self.strategy)
            .with_headers(&headers)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, ClientSettings::default());
        assert_eq!(settings.retry_delay(), Duration::from_secs(1));
        assert_eq!(settings.event_channel_capacity, 64);
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
        assert_eq!(settings.probe_interval(), Duration::from_secs(5));
        assert_eq!(settings.probe_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_partial_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"retryDelayMs": 250, "strategy": "retryOnConnectivity", "headers": {"X-Token": "abc"}}"#,
        )
        .unwrap();

        let settings = ClientSettings::load(&path).unwrap();
        assert_eq!(settings.retry_delay(), Duration::from_millis(250));
        assert_eq!(settings.strategy, SseStrategy::RetryOnConnectivity);
        assert_eq!(settings.headers.get("X-Token").map(String::as_str), Some("abc"));
        assert_eq!(settings.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_rejects_zero_capacity_and_probe_interval() {
        let zero_capacity = ClientSettings {
            event_channel_capacity: 0,
            ..Default::default()
        };
        assert!(zero_capacity.validate().is_err());

        let zero_interval = ClientSettings {
            probe_interval_ms: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"eventChannelCapacity": 0}"#).unwrap();
        assert!(ClientSettings::load(&path).is_err());
    }

    #[test]
    fn test_apply_keeps_request_headers() {
        let mut settings = ClientSettings {
            retry_delay_ms: 500,
            strategy: SseStrategy::RetryOnConnectivity,
            ..Default::default()
        };
        settings.headers.insert("X-Team".into(), "core".into());
        settings.headers.insert("X-Token".into(), "configured".into());

        let request = RequestConfig::new("https://example.com/feed")
            .unwrap()
            .with_header("x-token", "explicit")
            .unwrap();
        let applied = settings.apply(request).unwrap();

        assert_eq!(applied.retry_delay(), Duration::from_millis(500));
        assert_eq!(applied.strategy(), SseStrategy::RetryOnConnectivity);
        assert_eq!(applied.header("X-Team"), Some("core"));
        assert_eq!(applied.header("X-Token"), Some("explicit"));
    }
}
