//! Publisher configuration.
//!
//! Loaded from environment variables, with `from_vars` for tests.

use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default WHIP endpoint base.
pub const DEFAULT_WHIP_ENDPOINT: &str = "http://localhost:8889";

/// Default base of the downstream viewer URL.
pub const DEFAULT_MEDIAMTX_OUTPUT_URL: &str = "rtsp://localhost:8554";

/// Default timeout for WHIP HTTP requests, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// WHIP publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Relay signaling endpoint base (default: "http://localhost:8889").
    pub whip_endpoint: String,

    /// Base of the URL viewers use to pull a published path
    /// (default: "rtsp://localhost:8554").
    pub output_url: String,

    /// Timeout for the signaling POST and DELETE.
    pub request_timeout: Duration,

    /// Bound on the ICE gathering wait. `None` waits indefinitely.
    pub ice_gathering_timeout: Option<Duration>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            whip_endpoint: DEFAULT_WHIP_ENDPOINT.to_string(),
            output_url: DEFAULT_MEDIAMTX_OUTPUT_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            ice_gathering_timeout: None,
        }
    }
}

impl PublisherConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    ///
    /// Blank values fall back to the defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| {
            vars.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let whip_endpoint = non_blank("WHIP_ENDPOINT")
            .unwrap_or(DEFAULT_WHIP_ENDPOINT)
            .to_string();

        let output_url = non_blank("MEDIAMTX_OUTPUT_URL")
            .unwrap_or(DEFAULT_MEDIAMTX_OUTPUT_URL)
            .to_string();

        let request_timeout = match non_blank("WHIP_REQUEST_TIMEOUT_SECS") {
            Some(value) => {
                let seconds = value.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "WHIP_REQUEST_TIMEOUT_SECS".to_string(),
                        format!("expected a positive integer, got '{value}'"),
                    )
                })?;
                Duration::from_secs(seconds)
            }
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        };

        let ice_gathering_timeout = match non_blank("WHIP_ICE_GATHERING_TIMEOUT_MS") {
            Some(value) => {
                let millis = value.parse::<u64>().ok().filter(|ms| *ms > 0).ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "WHIP_ICE_GATHERING_TIMEOUT_MS".to_string(),
                        format!("expected a positive integer, got '{value}'"),
                    )
                })?;
                Some(Duration::from_millis(millis))
            }
            None => None,
        };

        Ok(Self {
            whip_endpoint,
            output_url,
            request_timeout,
            ice_gathering_timeout,
        })
    }

    /// Viewer URL for `path`: `{scheme}://{host}/{path}`.
    ///
    /// An unparseable base is used as-is with trailing slashes trimmed.
    pub fn output_url(&self, path: &str) -> String {
        let base = match Url::parse(&self.output_url) {
            Ok(url) => match url.host_str() {
                Some(host) => match url.port() {
                    Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                    None => format!("{}://{}", url.scheme(), host),
                },
                None => self.output_url.trim_end_matches('/').to_string(),
            },
            Err(_) => self.output_url.trim_end_matches('/').to_string(),
        };
        format!("{base}/{path}")
    }
}
