//! Actor model implementation for the Session Code Store.
//!
//! ```text
//! RoomDirectory (one per process)
//! └── RoomActor (one per room name, spawned on first use)
//!     └── owns a RoomStorage backend
//! ```
//!
//! Every request to a room goes through its mailbox, so operations against
//! one room are processed one at a time. Concurrent writers to the same key
//! race at the mailbox and the last one wins.
//!
//! # Modules
//!
//! - [`directory`] - `RoomDirectory` registry of room actors by name
//! - [`messages`] - Message types for actor communication
//! - [`room`] - `RoomActor`, its handle and the storage seam

pub mod directory;
pub mod messages;
pub mod room;

pub use directory::RoomDirectory;
pub use messages::*;
pub use room::{MemoryRoomStorage, RoomActor, RoomActorHandle, RoomStorage, StorageError};
