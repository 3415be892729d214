//! Message types for room actor communication.
//!
//! Requests travel over `tokio::sync::mpsc`; replies come back on a
//! `tokio::sync::oneshot` carried inside each message.

use common::error::StoreError;
use common::types::SessionRecord;
use tokio::sync::oneshot;

/// Messages sent to `RoomActor`.
///
/// Keys are carried unvalidated; the actor checks them before any storage
/// access.
#[derive(Debug)]
pub enum RoomMessage {
    /// Read the record stored under `key`.
    Get {
        key: String,
        /// Response channel for the record or error.
        respond_to: oneshot::Sender<Result<SessionRecord, StoreError>>,
    },

    /// Store `record` under `key`, replacing any existing record.
    Create {
        key: String,
        record: SessionRecord,
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<Result<(), StoreError>>,
    },

    /// Delete the record stored under `key`, if any.
    Remove {
        key: String,
        /// Response channel reporting whether a record was deleted.
        respond_to: oneshot::Sender<Result<RemoveOutcome, StoreError>>,
    },

    /// Report the number of stored records (for health checks).
    GetStatus {
        respond_to: oneshot::Sender<RoomStatus>,
    },
}

/// Result of a successful remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// A record existed and was deleted.
    Removed,
    /// No record existed for the key.
    Absent,
}

/// Snapshot of a room actor's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    /// Name the room is registered under.
    pub name: String,
    /// Number of records currently stored.
    pub records: usize,
}
