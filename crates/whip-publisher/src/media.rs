//! Local media tracks.
//!
//! A `MediaTrack` wraps a webrtc-rs sample track with the lifecycle a capture
//! source has: it can be stopped by its owner, or it can end on its own (the
//! user revokes a screen share, a device is unplugged). Ending fires the
//! track's `ended` token so observers can react.

use crate::errors::PublishError;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    fn codec(self) -> RTCRtpCodecCapability {
        match self {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        }
    }
}

/// A local media track.
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    local: Arc<TrackLocalStaticSample>,
    stopped: AtomicBool,
    ended: CancellationToken,
}

impl MediaTrack {
    /// Create a live track belonging to `stream_id`.
    pub fn new(kind: TrackKind, id: &str, stream_id: &str) -> Self {
        let local = Arc::new(TrackLocalStaticSample::new(
            kind.codec(),
            id.to_string(),
            stream_id.to_string(),
        ));

        Self {
            id: id.to_string(),
            kind,
            local,
            stopped: AtomicBool::new(false),
            ended: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// The webrtc-rs track attached to peer connections.
    pub fn local(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.local)
    }

    /// Release the track. Idempotent, and does not fire `ended`.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!(target: "whip.media", track = %self.id, "Track stopped");
        }
    }

    /// The source ended on its own. Stops the track and fires `ended`.
    pub fn end(&self) {
        self.stop();
        self.ended.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Token cancelled when the source ends.
    pub fn ended(&self) -> CancellationToken {
        self.ended.clone()
    }

    /// Forward one encoded media sample.
    ///
    /// # Errors
    ///
    /// `PublishError::TrackStopped` once the track is stopped.
    pub async fn write_sample(&self, data: Bytes, duration: Duration) -> Result<(), PublishError> {
        if self.is_stopped() {
            return Err(PublishError::TrackStopped(self.id.clone()));
        }

        self.local
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await
            .map_err(|e| PublishError::Media(e.to_string()))
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// An owned set of local tracks.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<MediaTrack>>) -> Self {
        Self { tracks }
    }

    /// A stream with one video and one audio track.
    pub fn audio_video(stream_id: &str) -> Self {
        Self::new(vec![
            Arc::new(MediaTrack::new(TrackKind::Video, "video", stream_id)),
            Arc::new(MediaTrack::new(TrackKind::Audio, "audio", stream_id)),
        ])
    }

    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stop every track.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
