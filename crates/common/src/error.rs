//! Error types shared by the Session Code Store and its callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed error taxonomy of the Session Code Store.
///
/// Serialized on the wire as `bad-request`, `unavailable` and
/// `internal-server-error`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreError {
    /// Key or record failed shape validation before reaching storage.
    #[error("bad-request")]
    BadRequest,

    /// No record exists for the key (read paths only).
    #[error("unavailable")]
    Unavailable,

    /// Storage failed, produced invalid data, or the transport broke.
    #[error("internal-server-error")]
    InternalServerError,
}

impl StoreError {
    /// Wire representation of the error.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreError::BadRequest => "bad-request",
            StoreError::Unavailable => "unavailable",
            StoreError::InternalServerError => "internal-server-error",
        }
    }

    /// HTTP status code used by the store's HTTP surface.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::BadRequest => 400,
            StoreError::Unavailable => 404,
            StoreError::InternalServerError => 500,
        }
    }
}

/// Errors raised while generating a session code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeError {
    /// The randomness source failed to produce bytes.
    #[error("Randomness source failure")]
    Rng,

    /// The randomness source kept producing rejected bytes.
    #[error("Randomness source exhausted without producing a code")]
    Exhausted,
}
