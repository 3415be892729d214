//! Publisher error type.

use thiserror::Error;

/// Failure of a publish attempt.
///
/// Every variant is fatal to the `start` call that produced it, never to the
/// publisher itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("media stream has no tracks")]
    EmptyStream,

    #[error("track {0} is stopped")]
    TrackStopped(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("peer connection error: {0}")]
    PeerConnection(String),

    #[error("failed to create SDP offer")]
    EmptyOffer,

    #[error("ICE gathering did not complete within {0:?}")]
    IceGatheringTimeout(std::time::Duration),

    #[error("WHIP request failed: {0}")]
    Signaling(String),

    #[error("WHIP request failed: {0}")]
    Rejected(u16),

    #[error("session was stopped during negotiation")]
    Superseded,
}
