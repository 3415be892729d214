//! Common data types for the Session Code Store.

use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of characters in a session code.
pub const SESSION_CODE_LENGTH: usize = 4;

/// A 4-character `[A-Za-z0-9]` code identifying one ephemeral room.
///
/// Construction always validates, so holding a `SessionCode` means the
/// shape check already passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(pub(crate) String);

impl SessionCode {
    /// Validate `value` as a session code.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BadRequest` unless `value` matches `^[A-Za-z0-9]{4}$`.
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        if is_valid_code(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(StoreError::BadRequest)
        }
    }

    /// Borrow the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_code(value: &str) -> bool {
    value.len() == SESSION_CODE_LENGTH && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl TryFrom<String> for SessionCode {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_code(&value) {
            Ok(Self(value))
        } else {
            Err(StoreError::BadRequest)
        }
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

impl FromStr for SessionCode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SessionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The value stored against a session code.
///
/// `created_at` is kept verbatim so a read returns exactly what was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// ISO-8601 UTC timestamp (`YYYY-MM-DDTHH:MM:SS[.fff]Z`).
    pub created_at: String,
}

impl SessionRecord {
    /// Build a record stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Build a record stamped with `instant`.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            created_at: instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Check the record against the stored-value schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BadRequest` if `created_at` is not an ISO-8601
    /// UTC datetime with a trailing `Z`.
    pub fn validate(&self) -> Result<(), StoreError> {
        if is_iso_utc_datetime(&self.created_at) {
            Ok(())
        } else {
            Err(StoreError::BadRequest)
        }
    }
}

fn is_iso_utc_datetime(value: &str) -> bool {
    value.as_bytes().get(10) == Some(&b'T')
        && value.ends_with('Z')
        && DateTime::parse_from_rfc3339(value).is_ok()
}

/// Response envelope of the store's HTTP surface.
///
/// `{"ok": true, "value": ...}` on success (value omitted for writes),
/// `{"ok": false, "error": "..."}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RoomResponse<T> {
    /// Whether the operation succeeded.
    pub ok: bool,

    /// Payload of a successful read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,

    /// Error code of a failed operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StoreError>,
}

impl<T> RoomResponse<T> {
    /// Successful response without a payload.
    #[must_use]
    pub fn success() -> Self {
        Self {
            ok: true,
            value: None,
            error: None,
        }
    }

    /// Successful response carrying `value`.
    #[must_use]
    pub fn value(value: T) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    /// Failed response carrying `error`.
    #[must_use]
    pub fn failure(error: StoreError) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(error),
        }
    }

    /// Convert the envelope into a result.
    ///
    /// # Errors
    ///
    /// Returns the carried error, or `StoreError::InternalServerError` when a
    /// failed envelope is missing its error code.
    pub fn into_result(self) -> Result<Option<T>, StoreError> {
        if self.ok {
            Ok(self.value)
        } else {
            Err(self.error.unwrap_or(StoreError::InternalServerError))
        }
    }
}
