//! WHIP publisher.
//!
//! Publishes a local media stream to a WebRTC relay over WHIP: one HTTP POST
//! carrying a fully gathered SDP offer, answered with the relay's SDP, and a
//! best-effort DELETE of the relay resource on teardown.
//!
//! # Modules
//!
//! - `config` - Endpoint configuration from environment variables
//! - `errors` - Publish error type
//! - `media` - Local media tracks and streams
//! - `peer` - Peer connection seam and the webrtc-rs implementation
//! - `publisher` - Publisher state machine
//! - `signaling` - WHIP HTTP signaling

pub mod config;
pub mod errors;
pub mod media;
pub mod peer;
pub mod publisher;
pub mod signaling;

pub use config::PublisherConfig;
pub use errors::PublishError;
pub use media::{MediaStream, MediaTrack, TrackKind};
pub use publisher::{PublisherState, WhipPublisher};
