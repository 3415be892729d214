//! `RoomDirectory` - registry of room actors addressed by name.
//!
//! The service always addresses one well-known room, but the directory is
//! keyed so additional rooms are a naming decision rather than a new
//! component. Rooms are spawned lazily and share the directory's
//! cancellation token.

use super::room::{MemoryRoomStorage, RoomActorHandle, RoomStorage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Factory producing a fresh storage backend for a newly spawned room.
pub type StorageFactory = Arc<dyn Fn() -> Box<dyn RoomStorage> + Send + Sync>;

/// Registry of room actors by name.
#[derive(Clone)]
pub struct RoomDirectory {
    rooms: Arc<Mutex<HashMap<String, RoomActorHandle>>>,
    storage_factory: StorageFactory,
    cancel_token: CancellationToken,
}

impl RoomDirectory {
    /// Create a directory whose rooms use in-memory storage.
    #[must_use]
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self::with_storage(
            cancel_token,
            Arc::new(|| Box::new(MemoryRoomStorage::new()) as Box<dyn RoomStorage>),
        )
    }

    /// Create a directory whose rooms use storage built by `storage_factory`.
    #[must_use]
    pub fn with_storage(cancel_token: CancellationToken, storage_factory: StorageFactory) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            storage_factory,
            cancel_token,
        }
    }

    /// Get the room registered under `name`, spawning it on first use.
    pub async fn room(&self, name: &str) -> RoomActorHandle {
        let mut rooms = self.rooms.lock().await;

        if let Some(handle) = rooms.get(name) {
            if !handle.is_cancelled() {
                return handle.clone();
            }
        }

        info!(target: "room.directory", room = %name, "Spawning room actor");
        let handle = RoomActorHandle::new(
            name.to_string(),
            (self.storage_factory)(),
            self.cancel_token.child_token(),
        );
        rooms.insert(name.to_string(), handle.clone());
        handle
    }

    /// Number of registered rooms.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Whether no room has been spawned yet.
    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    /// Cancel every room actor.
    pub fn shutdown(&self) {
        info!(target: "room.directory", "Shutting down room actors");
        self.cancel_token.cancel();
    }
}
