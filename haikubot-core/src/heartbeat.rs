//! Liveness pings to an operator-configured URL
//!
//! The engine fires a beat on a fixed interval from a detached task. A failed
//! beat is logged and forgotten.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::HeartbeatConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait Heartbeat: Send + Sync {
    async fn beat(&self) -> Result<()>;
}

/// `GET`s the configured URL and expects a 2xx answer.
pub struct HttpHeartbeat {
    client: reqwest::Client,
    url: String,
}

impl HttpHeartbeat {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build from configuration. `None` when no URL is configured.
    pub fn from_config(config: &HeartbeatConfig) -> Result<Option<Self>> {
        match config.resolved_url() {
            Some(url) => Ok(Some(Self::new(url, Duration::from_secs(config.timeout_secs))?)),
            None => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Heartbeat for HttpHeartbeat {
    async fn beat(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Heartbeat(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Heartbeat(format!("{} answered {}", self.url, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_without_url_is_none() {
        let config = HeartbeatConfig {
            url: None,
            ..Default::default()
        };
        // the env fallback is only consulted when set
        if std::env::var("HEARTBEAT_URL").is_err() {
            assert!(HttpHeartbeat::from_config(&config).unwrap().is_none());
        }
    }

    #[test]
    fn test_from_config_with_url() {
        let config = HeartbeatConfig {
            url: Some("https://hc.example.com/ping/abc".to_string()),
            ..Default::default()
        };
        let heartbeat = HttpHeartbeat::from_config(&config).unwrap().unwrap();
        assert_eq!(heartbeat.url(), "https://hc.example.com/ping/abc");
    }

    #[tokio::test]
    async fn test_unreachable_url_is_heartbeat_error() {
        let heartbeat = HttpHeartbeat::new("http://127.0.0.1:9/", Duration::from_secs(2)).unwrap();
        assert!(matches!(heartbeat.beat().await, Err(Error::Heartbeat(_))));
    }
}
