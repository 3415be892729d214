//! Bot verification client (Cloudflare Turnstile siteverify).
//!
//! Session issuance is gated on a verification token. The token is checked
//! against the siteverify endpoint, and every outcome is reduced to either a
//! `Verification` or one of seven `VerificationError` codes.
//!
//! # Security
//!
//! - The secret key is held as `SecretString` and only exposed when building
//!   the form body
//! - Response bodies are schema-checked; anything unexpected is
//!   `internal-error`

use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument, warn};

/// Closed set of verification failure codes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationError {
    #[error("missing-input-secret")]
    MissingInputSecret,

    #[error("invalid-input-secret")]
    InvalidInputSecret,

    #[error("missing-input-response")]
    MissingInputResponse,

    #[error("invalid-input-response")]
    InvalidInputResponse,

    #[error("bad-request")]
    BadRequest,

    #[error("timeout-or-duplicate")]
    TimeoutOrDuplicate,

    #[error("internal-error")]
    InternalError,
}

impl VerificationError {
    /// Wire representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationError::MissingInputSecret => "missing-input-secret",
            VerificationError::InvalidInputSecret => "invalid-input-secret",
            VerificationError::MissingInputResponse => "missing-input-response",
            VerificationError::InvalidInputResponse => "invalid-input-response",
            VerificationError::BadRequest => "bad-request",
            VerificationError::TimeoutOrDuplicate => "timeout-or-duplicate",
            VerificationError::InternalError => "internal-error",
        }
    }

    /// Map a siteverify error code into the closed set.
    ///
    /// Codes outside the set become `InternalError`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "missing-input-secret" => VerificationError::MissingInputSecret,
            "invalid-input-secret" => VerificationError::InvalidInputSecret,
            "missing-input-response" => VerificationError::MissingInputResponse,
            "invalid-input-response" => VerificationError::InvalidInputResponse,
            "bad-request" => VerificationError::BadRequest,
            "timeout-or-duplicate" => VerificationError::TimeoutOrDuplicate,
            _ => VerificationError::InternalError,
        }
    }
}

/// Details of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// ISO-8601 timestamp of the challenge.
    pub challenge_ts: String,
    /// Hostname of the site where the challenge was solved.
    pub hostname: String,
    /// Widget action, if one was configured.
    pub action: Option<String>,
}

/// Raw siteverify response body.
#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(default)]
    challenge_ts: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(rename = "error-codes", default)]
    error_codes: Option<Vec<String>>,
    #[serde(default)]
    action: Option<String>,
}

impl SiteverifyResponse {
    /// Check the body against the success/failure schemas.
    fn into_outcome(self) -> Result<Verification, VerificationError> {
        if self.success {
            match (self.challenge_ts, self.hostname) {
                (Some(challenge_ts), Some(hostname)) => Ok(Verification {
                    challenge_ts,
                    hostname,
                    action: self.action,
                }),
                _ => {
                    warn!(target: "room.services.verification", "Success response missing challenge_ts or hostname");
                    Err(VerificationError::InternalError)
                }
            }
        } else {
            match self.error_codes.as_deref().and_then(<[String]>::first) {
                Some(code) => Err(VerificationError::from_code(code)),
                None => {
                    warn!(target: "room.services.verification", "Failure response carried no error codes");
                    Err(VerificationError::InternalError)
                }
            }
        }
    }
}

/// Trait for verification operations (enables mocking).
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    /// Verify `token`, optionally bound to the client's IP.
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<Verification, VerificationError>;
}

/// Turnstile siteverify client.
#[derive(Clone)]
pub struct TurnstileVerifier {
    client: Client,
    verify_url: String,
    secret_key: SecretString,
}

impl TurnstileVerifier {
    /// Create a new verifier.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::InternalError` if the HTTP client cannot be built.
    pub fn new(
        verify_url: String,
        secret_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, VerificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "room.services.verification", error = %e, "Failed to build HTTP client");
                VerificationError::InternalError
            })?;

        Ok(Self {
            client,
            verify_url,
            secret_key,
        })
    }
}

#[async_trait::async_trait]
impl Verifier for TurnstileVerifier {
    #[instrument(skip_all, name = "room.verification.verify", fields(has_remote_ip = remote_ip.is_some()))]
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<Verification, VerificationError> {
        let mut form = vec![
            ("secret", self.secret_key.expose_secret()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip.filter(|ip| !ip.is_empty()) {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "room.services.verification", error = %e, "Siteverify request failed");
                VerificationError::InternalError
            })?;

        let body = response.json::<SiteverifyResponse>().await.map_err(|e| {
            warn!(target: "room.services.verification", error = %e, "Siteverify response failed schema validation");
            VerificationError::InternalError
        })?;

        body.into_outcome()
    }
}

/// Mock verifier module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock verifier returning a fixed outcome.
    pub struct MockVerifier {
        failure: Option<VerificationError>,
        call_count: AtomicUsize,
    }

    impl MockVerifier {
        /// Create a mock that accepts every token.
        pub fn passing() -> Self {
            Self {
                failure: None,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Create a mock that rejects every token with `error`.
        pub fn failing(error: VerificationError) -> Self {
            Self {
                failure: Some(error),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Verifier for MockVerifier {
        async fn verify(
            &self,
            _token: &str,
            _remote_ip: Option<&str>,
        ) -> Result<Verification, VerificationError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            match self.failure {
                Some(error) => Err(error),
                None => Ok(Verification {
                    challenge_ts: "2024-01-01T00:00:00Z".to_string(),
                    hostname: "localhost".to_string(),
                    action: None,
                }),
            }
        }
    }
}
