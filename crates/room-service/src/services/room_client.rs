//! Store Client: HTTP client for a remote room service.
//!
//! Translates the `{ok, value?, error?}` envelope of `/room/:key` into
//! `Result<_, StoreError>`. Keys and records are validated before any request
//! is sent. Transport failures, non-JSON bodies and malformed envelopes are
//! always reported as `internal-server-error`.

use crate::services::room_store::RoomStore;
use common::error::StoreError;
use common::types::{RoomResponse, SessionCode, SessionRecord};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Connect timeout for room service requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a remote room service.
///
/// Holds no per-operation state and is safe to share across tasks.
#[derive(Clone)]
pub struct RoomStoreClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL of the room service (e.g., "http://localhost:8080").
    base_url: String,
}

impl RoomStoreClient {
    /// Create a new Store Client.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InternalServerError` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "room.services.room_client", error = %e, "Failed to build HTTP client");
                StoreError::InternalServerError
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn room_url(&self, code: &SessionCode) -> String {
        format!("{}/room/{}", self.base_url, code)
    }

    /// Read the envelope from `response`, whatever its status.
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>, StoreError> {
        let status = response.status();
        let envelope = response.json::<RoomResponse<T>>().await.map_err(|e| {
            warn!(
                target: "room.services.room_client",
                status = %status,
                error = %e,
                "Room service returned an unreadable body"
            );
            StoreError::InternalServerError
        })?;

        envelope.into_result()
    }

    fn transport_error(err: &reqwest::Error) -> StoreError {
        warn!(target: "room.services.room_client", error = %err, "Room service request failed");
        StoreError::InternalServerError
    }
}

#[async_trait::async_trait]
impl RoomStore for RoomStoreClient {
    #[instrument(skip(self), name = "room.client.get")]
    async fn get(&self, key: &str) -> Result<SessionRecord, StoreError> {
        let code = SessionCode::parse(key)?;

        let response = self
            .client
            .get(self.room_url(&code))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        let record = Self::read_envelope::<SessionRecord>(response)
            .await?
            .ok_or_else(|| {
                warn!(target: "room.services.room_client", "Successful read carried no value");
                StoreError::InternalServerError
            })?;

        record
            .validate()
            .map_err(|_| StoreError::InternalServerError)?;

        Ok(record)
    }

    #[instrument(skip(self, record), name = "room.client.create")]
    async fn create(&self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let code = SessionCode::parse(key)?;
        record.validate()?;

        let response = self
            .client
            .put(self.room_url(&code))
            .json(record)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        Self::read_envelope::<serde_json::Value>(response)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), name = "room.client.remove")]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let code = SessionCode::parse(key)?;

        let response = self
            .client
            .delete(self.room_url(&code))
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        match Self::read_envelope::<serde_json::Value>(response).await {
            Ok(_) => Ok(()),
            // The caller just verified the key exists; not-found here is an inconsistency.
            Err(StoreError::Unavailable) => Err(StoreError::InternalServerError),
            Err(err) => Err(err),
        }
    }
}
