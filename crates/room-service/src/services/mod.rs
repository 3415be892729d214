//! Service layer for the room service.
//!
//! This module contains services that interact with external systems
//! and encapsulate business logic.
//!
//! # Components
//!
//! - `room_store` - `RoomStore` contract, in-process implementations and mock
//! - `room_client` - HTTP Store Client for a remote room service
//! - `verification` - Turnstile siteverify client

pub mod room_client;
pub mod room_store;
pub mod verification;

pub use room_client::RoomStoreClient;
pub use room_store::mock::MockRoomStore;
pub use room_store::{DirectoryRoomStore, RoomStore};
pub use verification::mock::MockVerifier;
pub use verification::{TurnstileVerifier, Verification, VerificationError, Verifier};
