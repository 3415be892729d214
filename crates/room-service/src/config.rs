//! Room service configuration.
//!
//! Configuration is loaded from environment variables. The verification
//! secret is redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Well-known name of the single room every session code lives in.
pub const DEFAULT_ROOM_NAME: &str = "room";

/// Default Cloudflare Turnstile siteverify endpoint.
pub const DEFAULT_TURNSTILE_VERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Default timeout for outbound HTTP calls, in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the outbound HTTP timeout, in seconds.
pub const MAX_UPSTREAM_TIMEOUT_SECONDS: u64 = 120;

/// Room service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Name of the room actor that stores session codes (default: "room").
    pub room_name: String,

    /// Base URL of a remote room service.
    ///
    /// When set, session issuance and relay auth go through the Store Client
    /// instead of the in-process actor.
    pub room_store_url: Option<String>,

    /// Turnstile secret key used for siteverify calls.
    pub turnstile_secret_key: SecretString,

    /// Siteverify endpoint URL.
    pub turnstile_verify_url: String,

    /// Timeout for outbound HTTP calls in seconds.
    pub upstream_timeout_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("room_name", &self.room_name)
            .field("room_store_url", &self.room_store_url)
            .field("turnstile_secret_key", &"[REDACTED]")
            .field("turnstile_verify_url", &self.turnstile_verify_url)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid room name: {0}")]
    InvalidRoomName(String),

    #[error("Invalid upstream timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let turnstile_secret_key = vars
            .get("TURNSTILE_SECRET_KEY")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TURNSTILE_SECRET_KEY".to_string()))?;
        let turnstile_secret_key = SecretString::from(turnstile_secret_key.clone());

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let room_name = vars
            .get("ROOM_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROOM_NAME.to_string());

        if room_name.is_empty() || room_name.len() > 64 {
            return Err(ConfigError::InvalidRoomName(format!(
                "ROOM_NAME must be 1-64 characters, got {} characters",
                room_name.len()
            )));
        }

        if !room_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::InvalidRoomName(format!(
                "ROOM_NAME must contain only letters, digits, '-' or '_', got '{room_name}'"
            )));
        }

        let room_store_url = vars
            .get("ROOM_STORE_URL")
            .filter(|value| !value.is_empty())
            .map(|value| value.trim_end_matches('/').to_string());

        let turnstile_verify_url = vars
            .get("TURNSTILE_VERIFY_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TURNSTILE_VERIFY_URL.to_string());

        let upstream_timeout_seconds =
            if let Some(value_str) = vars.get("UPSTREAM_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidTimeout(format!(
                        "UPSTREAM_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidTimeout(
                        "UPSTREAM_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_UPSTREAM_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidTimeout(format!(
                        "UPSTREAM_TIMEOUT_SECONDS must not exceed {MAX_UPSTREAM_TIMEOUT_SECONDS} seconds, got {value}"
                    )));
                }

                value
            } else {
                DEFAULT_UPSTREAM_TIMEOUT_SECONDS
            };

        Ok(Config {
            bind_address,
            room_name,
            room_store_url,
            turnstile_secret_key,
            turnstile_verify_url,
            upstream_timeout_seconds,
        })
    }
}
