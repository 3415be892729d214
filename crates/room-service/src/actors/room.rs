//! `RoomActor` - serialized owner of one room's session code records.
//!
//! The actor is the only code that touches its `RoomStorage`. Callers hold a
//! cloneable `RoomActorHandle` and talk to it over a bounded mailbox.
//!
//! Records are stored as raw JSON bytes and re-validated on every read, so a
//! backend holding corrupted data surfaces `internal-server-error` rather
//! than handing malformed records to callers.

use super::messages::{RemoveOutcome, RoomMessage, RoomStatus};
use crate::observability::metrics::record_store_operation;
use bytes::Bytes;
use common::error::StoreError;
use common::types::{SessionCode, SessionRecord};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for a room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 256;

/// Failure reported by a storage backend.
#[derive(Debug, Error)]
#[error("Storage failure: {0}")]
pub struct StorageError(pub String);

/// Key-value storage owned by a single `RoomActor`.
///
/// Values are the serialized JSON form of a `SessionRecord`. Writes replace
/// any existing value.
pub trait RoomStorage: Send + 'static {
    /// Read the value stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Store `value` under `key`, replacing any existing value.
    fn write(&mut self, key: &str, value: Bytes) -> Result<(), StorageError>;

    /// Delete the value under `key`. Returns whether a value existed.
    fn delete(&mut self, key: &str) -> Result<bool, StorageError>;

    /// Number of stored values.
    fn count(&self) -> Result<usize, StorageError>;
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryRoomStorage {
    entries: HashMap<String, Bytes>,
}

impl MemoryRoomStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with raw values.
    ///
    /// Values are not validated, which lets tests seed corrupted records.
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Bytes)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl RoomStorage for MemoryRoomStorage {
    fn read(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: Bytes) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.entries.len())
    }
}

/// Handle to a `RoomActor`.
///
/// This is the public interface for interacting with one room.
/// All methods are async and return results via oneshot channels.
#[derive(Clone)]
pub struct RoomActorHandle {
    name: String,
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
}

impl RoomActorHandle {
    /// Spawn a new `RoomActor` over `storage` and return a handle to it.
    ///
    /// The actor stops when `cancel_token` is cancelled or every handle is
    /// dropped.
    #[must_use]
    pub fn new(
        name: String,
        storage: Box<dyn RoomStorage>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = RoomActor {
            name: name.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            storage,
        };

        tokio::spawn(actor.run());

        Self {
            name,
            sender,
            cancel_token,
        }
    }

    /// Spawn a room backed by `MemoryRoomStorage`.
    #[must_use]
    pub fn in_memory(name: String, cancel_token: CancellationToken) -> Self {
        Self::new(name, Box::new(MemoryRoomStorage::new()), cancel_token)
    }

    /// Name this room is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the record stored under `key`.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `key` is not a valid session code
    /// - `Unavailable` if no record exists
    /// - `InternalServerError` if the stored data is invalid or the actor is gone
    pub async fn get(&self, key: &str) -> Result<SessionRecord, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Get {
            key: key.to_string(),
            respond_to: tx,
        })
        .await?;

        self.receive(rx).await?
    }

    /// Store `record` under `key`, replacing any existing record.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `key` or `record` fails validation
    /// - `InternalServerError` if storage fails or the actor is gone
    pub async fn create(&self, key: &str, record: SessionRecord) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Create {
            key: key.to_string(),
            record,
            respond_to: tx,
        })
        .await?;

        self.receive(rx).await?
    }

    /// Delete the record under `key`.
    ///
    /// A missing record is reported as `RemoveOutcome::Absent`, not an error.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `key` is not a valid session code
    /// - `InternalServerError` if storage fails or the actor is gone
    pub async fn remove(&self, key: &str) -> Result<RemoveOutcome, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Remove {
            key: key.to_string(),
            respond_to: tx,
        })
        .await?;

        self.receive(rx).await?
    }

    /// Get the current room status.
    ///
    /// # Errors
    ///
    /// Returns `InternalServerError` if the actor is gone.
    pub async fn get_status(&self) -> Result<RoomStatus, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::GetStatus { respond_to: tx }).await?;
        self.receive(rx).await
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: RoomMessage) -> Result<(), StoreError> {
        self.sender.send(message).await.map_err(|e| {
            error!(target: "room.actor", room = %self.name, error = %e, "Room mailbox send failed");
            StoreError::InternalServerError
        })
    }

    async fn receive<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, StoreError> {
        rx.await.map_err(|e| {
            error!(target: "room.actor", room = %self.name, error = %e, "Room response receive failed");
            StoreError::InternalServerError
        })
    }
}

/// The `RoomActor` implementation.
///
/// This struct owns the storage backend and runs the message loop.
pub struct RoomActor {
    /// Room name (for logging).
    name: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the directory's token).
    cancel_token: CancellationToken,
    /// Exclusively owned storage backend.
    storage: Box<dyn RoomStorage>,
}

impl RoomActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "room.actor", fields(room = %self.name))]
    async fn run(mut self) {
        info!(target: "room.actor", room = %self.name, "RoomActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "room.actor",
                        room = %self.name,
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(
                                target: "room.actor",
                                room = %self.name,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "room.actor", room = %self.name, "RoomActor stopped");
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Get { key, respond_to } => {
                let start = Instant::now();
                let result = self.get(&key);
                record_store_operation("get", outcome_label(&result), start.elapsed());
                let _ = respond_to.send(result);
            }
            RoomMessage::Create {
                key,
                record,
                respond_to,
            } => {
                let start = Instant::now();
                let result = self.create(&key, &record);
                record_store_operation("create", outcome_label(&result), start.elapsed());
                let _ = respond_to.send(result);
            }
            RoomMessage::Remove { key, respond_to } => {
                let start = Instant::now();
                let result = self.remove(&key);
                let outcome = match &result {
                    Ok(RemoveOutcome::Absent) => "absent",
                    other => outcome_label(other),
                };
                record_store_operation("remove", outcome, start.elapsed());
                let _ = respond_to.send(result);
            }
            RoomMessage::GetStatus { respond_to } => {
                let records = self.storage.count().unwrap_or_else(|e| {
                    warn!(target: "room.actor", room = %self.name, error = %e, "Failed to count records");
                    0
                });
                let _ = respond_to.send(RoomStatus {
                    name: self.name.clone(),
                    records,
                });
            }
        }
    }

    fn get(&self, key: &str) -> Result<SessionRecord, StoreError> {
        let code = SessionCode::parse(key)?;

        let bytes = self
            .storage
            .read(code.as_str())
            .map_err(|e| self.storage_failure("read", &e))?
            .ok_or(StoreError::Unavailable)?;

        let record: SessionRecord = serde_json::from_slice(&bytes).map_err(|e| {
            error!(target: "room.actor", room = %self.name, error = %e, "Stored record is not valid JSON");
            StoreError::InternalServerError
        })?;

        record.validate().map_err(|_| {
            error!(target: "room.actor", room = %self.name, "Stored record failed validation");
            StoreError::InternalServerError
        })?;

        Ok(record)
    }

    fn create(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let code = SessionCode::parse(key)?;
        record.validate()?;

        let bytes = serde_json::to_vec(record).map_err(|e| {
            error!(target: "room.actor", room = %self.name, error = %e, "Failed to serialize record");
            StoreError::InternalServerError
        })?;

        // Insert-or-replace: an existing record under this code is overwritten.
        self.storage
            .write(code.as_str(), Bytes::from(bytes))
            .map_err(|e| self.storage_failure("write", &e))?;

        debug!(target: "room.actor", room = %self.name, "Record stored");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<RemoveOutcome, StoreError> {
        let code = SessionCode::parse(key)?;

        let existed = self
            .storage
            .delete(code.as_str())
            .map_err(|e| self.storage_failure("delete", &e))?;

        Ok(if existed {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::Absent
        })
    }

    fn storage_failure(&self, operation: &'static str, err: &StorageError) -> StoreError {
        error!(
            target: "room.actor",
            room = %self.name,
            operation,
            error = %err,
            "Storage operation failed"
        );
        StoreError::InternalServerError
    }
}

fn outcome_label<T>(result: &Result<T, StoreError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) => err.as_str(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record(created_at: &str) -> SessionRecord {
        SessionRecord {
            created_at: created_at.to_string(),
        }
    }

    /// Storage that counts every call and can be told to fail.
    struct InstrumentedStorage {
        inner: MemoryRoomStorage,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl InstrumentedStorage {
        fn new(calls: Arc<AtomicUsize>, fail: bool) -> Self {
            Self {
                inner: MemoryRoomStorage::new(),
                calls,
                fail,
            }
        }

        fn check(&self) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StorageError("disk on fire".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl RoomStorage for InstrumentedStorage {
        fn read(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
            self.check()?;
            self.inner.read(key)
        }

        fn write(&mut self, key: &str, value: Bytes) -> Result<(), StorageError> {
            self.check()?;
            self.inner.write(key, value)
        }

        fn delete(&mut self, key: &str) -> Result<bool, StorageError> {
            self.check()?;
            self.inner.delete(key)
        }

        fn count(&self) -> Result<usize, StorageError> {
            self.inner.count()
        }
    }

    fn spawn_room() -> RoomActorHandle {
        RoomActorHandle::in_memory("room".to_string(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_get_missing_is_unavailable() {
        let room = spawn_room();
        assert_eq!(room.get("ABCD").await, Err(StoreError::Unavailable));
    }

    #[tokio::test]
    async fn test_create_then_get_returns_exact_record() {
        let room = spawn_room();
        let stored = record("2024-01-01T00:00:00.000Z");

        room.create("ABCD", stored.clone()).await.unwrap();
        assert_eq!(room.get("ABCD").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_create_overwrites_existing_record() {
        let room = spawn_room();

        room.create("ABCD", record("2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        room.create("ABCD", record("2024-06-01T12:30:00Z"))
            .await
            .unwrap();

        assert_eq!(
            room.get("ABCD").await.unwrap().created_at,
            "2024-06-01T12:30:00Z"
        );
    }

    #[tokio::test]
    async fn test_remove_reports_outcome() {
        let room = spawn_room();
        room.create("ABCD", record("2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(room.remove("ABCD").await, Ok(RemoveOutcome::Removed));
        assert_eq!(room.get("ABCD").await, Err(StoreError::Unavailable));
        assert_eq!(room.remove("ABCD").await, Ok(RemoveOutcome::Absent));
    }

    #[tokio::test]
    async fn test_keys_are_case_sensitive() {
        let room = spawn_room();
        room.create("abcd", record("2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(room.get("ABCD").await, Err(StoreError::Unavailable));
        assert!(room.get("abcd").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_keys_never_reach_storage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let room = RoomActorHandle::new(
            "room".to_string(),
            Box::new(InstrumentedStorage::new(Arc::clone(&calls), false)),
            CancellationToken::new(),
        );

        for key in ["", "ABC", "ABCDE", "AB-D", "ab cd"] {
            assert_eq!(room.get(key).await, Err(StoreError::BadRequest));
            assert_eq!(
                room.create(key, record("2024-01-01T00:00:00Z")).await,
                Err(StoreError::BadRequest)
            );
            assert_eq!(room.remove(key).await, Err(StoreError::BadRequest));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_record_never_reaches_storage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let room = RoomActorHandle::new(
            "room".to_string(),
            Box::new(InstrumentedStorage::new(Arc::clone(&calls), false)),
            CancellationToken::new(),
        );

        assert_eq!(
            room.create("ABCD", record("not a date")).await,
            Err(StoreError::BadRequest)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupted_record_is_internal_error() {
        let storage = MemoryRoomStorage::with_entries([
            ("JUNK", Bytes::from_static(b"not json")),
            ("BADT", Bytes::from_static(br#"{"createdAt":"yesterday"}"#)),
            ("MISS", Bytes::from_static(br#"{"owner":"x"}"#)),
        ]);
        let room = RoomActorHandle::new(
            "room".to_string(),
            Box::new(storage),
            CancellationToken::new(),
        );

        for key in ["JUNK", "BADT", "MISS"] {
            assert_eq!(
                room.get(key).await,
                Err(StoreError::InternalServerError),
                "{key} should fail validation"
            );
        }
    }

    #[tokio::test]
    async fn test_storage_failures_are_internal_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let room = RoomActorHandle::new(
            "room".to_string(),
            Box::new(InstrumentedStorage::new(Arc::clone(&calls), true)),
            CancellationToken::new(),
        );

        assert_eq!(room.get("ABCD").await, Err(StoreError::InternalServerError));
        assert_eq!(
            room.create("ABCD", record("2024-01-01T00:00:00Z")).await,
            Err(StoreError::InternalServerError)
        );
        assert_eq!(
            room.remove("ABCD").await,
            Err(StoreError::InternalServerError)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_counts_records() {
        let room = spawn_room();
        room.create("AAAA", record("2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        room.create("BBBB", record("2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        let status = room.get_status().await.unwrap();
        assert_eq!(status.name, "room");
        assert_eq!(status.records, 2);
    }

    #[tokio::test]
    async fn test_cancelled_actor_reports_internal_error() {
        let room = spawn_room();
        room.cancel();
        assert!(room.is_cancelled());

        // Give the actor a chance to observe cancellation and drop its mailbox.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(room.get("ABCD").await, Err(StoreError::InternalServerError));
    }

    #[tokio::test]
    async fn test_concurrent_creates_last_writer_wins() {
        let room = spawn_room();

        let mut tasks = Vec::new();
        for second in 0..10 {
            let room = room.clone();
            tasks.push(tokio::spawn(async move {
                room.create("ABCD", record(&format!("2024-01-01T00:00:{second:02}Z")))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Exactly one of the writes survives intact.
        let stored = room.get("ABCD").await.unwrap();
        assert!(stored.created_at.starts_with("2024-01-01T00:00:"));
        assert_eq!(room.get_status().await.unwrap().records, 1);
    }
}
