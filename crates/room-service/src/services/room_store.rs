//! Caller-facing contract of the Session Code Store.
//!
//! `RoomStore` is what session issuance and relay auth depend on. It is
//! implemented in-process by `RoomActorHandle` and `DirectoryRoomStore`, and
//! remotely by `RoomStoreClient`, so every deployment shares one set of
//! semantics:
//!
//! - `get` reports `unavailable` when no record exists
//! - `create` overwrites any existing record
//! - `remove` never reports `unavailable`; a missing record on removal is an
//!   inconsistency and surfaces as `internal-server-error`

use crate::actors::{RemoveOutcome, RoomActorHandle, RoomDirectory};
use common::error::StoreError;
use common::types::SessionRecord;
use tracing::warn;

/// Trait for Session Code Store operations (enables mocking).
#[async_trait::async_trait]
pub trait RoomStore: Send + Sync {
    /// Read the record stored under `key`.
    async fn get(&self, key: &str) -> Result<SessionRecord, StoreError>;

    /// Store `record` under `key`, replacing any existing record.
    async fn create(&self, key: &str, record: &SessionRecord) -> Result<(), StoreError>;

    /// Delete the record stored under `key`.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl RoomStore for RoomActorHandle {
    async fn get(&self, key: &str) -> Result<SessionRecord, StoreError> {
        RoomActorHandle::get(self, key).await
    }

    async fn create(&self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        RoomActorHandle::create(self, key, record.clone()).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match RoomActorHandle::remove(self, key).await? {
            RemoveOutcome::Removed => Ok(()),
            RemoveOutcome::Absent => {
                warn!(target: "room.store", room = %self.name(), "Remove found no record");
                Err(StoreError::InternalServerError)
            }
        }
    }
}

/// `RoomStore` over a named room of a `RoomDirectory`.
///
/// The room is looked up on every call, so a room the directory respawned
/// after cancellation is picked up instead of a dead handle.
#[derive(Clone)]
pub struct DirectoryRoomStore {
    directory: RoomDirectory,
    name: String,
}

impl DirectoryRoomStore {
    pub fn new(directory: RoomDirectory, name: &str) -> Self {
        Self {
            directory,
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RoomStore for DirectoryRoomStore {
    async fn get(&self, key: &str) -> Result<SessionRecord, StoreError> {
        let room = self.directory.room(&self.name).await;
        RoomStore::get(&room, key).await
    }

    async fn create(&self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let room = self.directory.room(&self.name).await;
        RoomStore::create(&room, key, record).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let room = self.directory.room(&self.name).await;
        RoomStore::remove(&room, key).await
    }
}

/// Mock room store module for testing.
///
/// This module provides a scriptable `RoomStore` for handler tests.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Mock room store recording every call.
    #[derive(Default)]
    pub struct MockRoomStore {
        get_result: Option<Result<SessionRecord, StoreError>>,
        create_result: Option<Result<(), StoreError>>,
        remove_result: Option<Result<(), StoreError>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRoomStore {
        /// Create a mock where every operation succeeds.
        ///
        /// `get` returns a fixed record.
        pub fn accepting() -> Self {
            Self::default()
        }

        /// Make `get` return `result`.
        #[must_use]
        pub fn with_get(mut self, result: Result<SessionRecord, StoreError>) -> Self {
            self.get_result = Some(result);
            self
        }

        /// Make `create` return `result`.
        #[must_use]
        pub fn with_create(mut self, result: Result<(), StoreError>) -> Self {
            self.create_result = Some(result);
            self
        }

        /// Make `remove` return `result`.
        #[must_use]
        pub fn with_remove(mut self, result: Result<(), StoreError>) -> Self {
            self.remove_result = Some(result);
            self
        }

        /// Calls made so far, formatted as `"<operation> <key>"`.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn record_call(&self, operation: &str, key: &str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("{operation} {key}"));
            }
        }
    }

    #[async_trait::async_trait]
    impl RoomStore for MockRoomStore {
        async fn get(&self, key: &str) -> Result<SessionRecord, StoreError> {
            self.record_call("get", key);
            self.get_result.clone().unwrap_or_else(|| {
                Ok(SessionRecord {
                    created_at: "2024-01-01T00:00:00Z".to_string(),
                })
            })
        }

        async fn create(&self, key: &str, _record: &SessionRecord) -> Result<(), StoreError> {
            self.record_call("create", key);
            self.create_result.unwrap_or(Ok(()))
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.record_call("remove", key);
            self.remove_result.unwrap_or(Ok(()))
        }
    }
}
