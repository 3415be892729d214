//! Peer connection seam.
//!
//! `PeerConnection` is the slice of a WebRTC peer connection the publisher
//! drives. `WebRtcPeerConnection` implements it over webrtc-rs; the `mock`
//! module provides a scriptable stand-in for tests.

use crate::errors::PublishError;
use crate::media::MediaTrack;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

/// One local peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach a local track as an outbound sender.
    async fn add_track(&self, track: &MediaTrack) -> Result<(), PublishError>;

    /// Create an offer and commit it as the local description.
    async fn create_offer(&self) -> Result<(), PublishError>;

    /// Wait for ICE gathering to complete, then return the local SDP.
    ///
    /// Does not return until gathering completes.
    async fn gathered_offer(&self) -> Result<String, PublishError>;

    /// Commit `sdp` as the remote answer.
    async fn set_answer(&self, sdp: String) -> Result<(), PublishError>;

    /// Stop every outbound sender and close the connection.
    ///
    /// Failures are logged; close always completes.
    async fn close(&self);
}

/// Creates a fresh peer connection per publish session.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn PeerConnection>, PublishError>;
}

/// webrtc-rs peer connection.
pub struct WebRtcPeerConnection {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcPeerConnection {
    pub fn new(pc: Arc<RTCPeerConnection>) -> Self {
        pc.on_peer_connection_state_change(Box::new(|state| {
            Box::pin(async move {
                info!(target: "whip.peer", state = %state, "Peer connection state changed");
            })
        }));
        pc.on_ice_gathering_state_change(Box::new(|state| {
            Box::pin(async move {
                debug!(target: "whip.peer", state = %state, "ICE gathering state changed");
            })
        }));

        Self { pc }
    }
}

fn peer_error(context: &str, err: &webrtc::Error) -> PublishError {
    PublishError::PeerConnection(format!("{context}: {err}"))
}

#[async_trait]
impl PeerConnection for WebRtcPeerConnection {
    async fn add_track(&self, track: &MediaTrack) -> Result<(), PublishError> {
        let local: Arc<dyn TrackLocal + Send + Sync> = track.local();
        self.pc
            .add_track(local)
            .await
            .map_err(|e| peer_error("failed to add track", &e))?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<(), PublishError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| peer_error("failed to create offer", &e))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| peer_error("failed to set local description", &e))
    }

    async fn gathered_offer(&self) -> Result<String, PublishError> {
        let mut gathering_complete = self.pc.gathering_complete_promise().await;
        let _ = gathering_complete.recv().await;

        let sdp = self
            .pc
            .local_description()
            .await
            .map(|description| description.sdp)
            .filter(|sdp| !sdp.is_empty())
            .ok_or(PublishError::EmptyOffer)?;

        debug!(
            target: "whip.peer",
            candidates = sdp.matches("a=candidate:").count(),
            "ICE gathering complete"
        );
        Ok(sdp)
    }

    async fn set_answer(&self, sdp: String) -> Result<(), PublishError> {
        let answer =
            RTCSessionDescription::answer(sdp).map_err(|e| peer_error("invalid SDP answer", &e))?;

        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| peer_error("failed to set remote description", &e))
    }

    async fn close(&self) {
        for sender in self.pc.get_senders().await {
            if let Err(e) = sender.stop().await {
                warn!(target: "whip.peer", error = %e, "Failed to stop sender");
            }
        }

        if let Err(e) = self.pc.close().await {
            warn!(target: "whip.peer", error = %e, "Failed to close peer connection");
        }
    }
}

/// Factory for webrtc-rs peer connections with the default codecs and
/// interceptors.
pub struct WebRtcPeerConnectionFactory {
    api: API,
    configuration: RTCConfiguration,
}

impl WebRtcPeerConnectionFactory {
    /// # Errors
    ///
    /// `PublishError::PeerConnection` if codec or interceptor registration fails.
    pub fn new() -> Result<Self, PublishError> {
        Self::with_configuration(RTCConfiguration::default())
    }

    /// Use `configuration` (ICE servers, policies) for every connection.
    pub fn with_configuration(configuration: RTCConfiguration) -> Result<Self, PublishError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| peer_error("failed to register codecs", &e))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| peer_error("failed to register interceptors", &e))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, configuration })
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcPeerConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn PeerConnection>, PublishError> {
        let pc = self
            .api
            .new_peer_connection(self.configuration.clone())
            .await
            .map_err(|e| peer_error("failed to create peer connection", &e))?;

        Ok(Arc::new(WebRtcPeerConnection::new(Arc::new(pc))))
    }
}

/// Scriptable peer connection for tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Fixed offer returned by `gathered_offer`.
    pub const MOCK_OFFER_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\n";

    /// Step at which a mock connection fails.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockStep {
        Create,
        AddTrack,
        CreateOffer,
        Gathering,
        SetAnswer,
    }

    /// Mock peer connection recording what the publisher did to it.
    #[derive(Debug)]
    pub struct MockPeerConnection {
        fail_at: Option<MockStep>,
        gathering_gate: Option<CancellationToken>,
        offer_sdp: String,
        tracks: Mutex<Vec<String>>,
        answer: Mutex<Option<String>>,
        close_count: AtomicUsize,
    }

    impl MockPeerConnection {
        fn failure(&self, step: MockStep) -> Result<(), PublishError> {
            if self.fail_at == Some(step) {
                return Err(PublishError::PeerConnection(format!("injected {step:?} failure")));
            }
            Ok(())
        }

        /// Ids of attached tracks, in order.
        pub fn tracks(&self) -> Vec<String> {
            self.tracks.lock().map(|t| t.clone()).unwrap_or_default()
        }

        /// Remote answer committed, if any.
        pub fn answer(&self) -> Option<String> {
            self.answer.lock().ok().and_then(|a| a.clone())
        }

        pub fn is_closed(&self) -> bool {
            self.close_count() > 0
        }

        pub fn close_count(&self) -> usize {
            self.close_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerConnection for MockPeerConnection {
        async fn add_track(&self, track: &MediaTrack) -> Result<(), PublishError> {
            self.failure(MockStep::AddTrack)?;
            if let Ok(mut tracks) = self.tracks.lock() {
                tracks.push(track.id().to_string());
            }
            Ok(())
        }

        async fn create_offer(&self) -> Result<(), PublishError> {
            self.failure(MockStep::CreateOffer)
        }

        async fn gathered_offer(&self) -> Result<String, PublishError> {
            if let Some(gate) = &self.gathering_gate {
                gate.cancelled().await;
            }
            self.failure(MockStep::Gathering)?;
            if self.offer_sdp.is_empty() {
                return Err(PublishError::EmptyOffer);
            }
            Ok(self.offer_sdp.clone())
        }

        async fn set_answer(&self, sdp: String) -> Result<(), PublishError> {
            self.failure(MockStep::SetAnswer)?;
            if let Ok(mut answer) = self.answer.lock() {
                *answer = Some(sdp);
            }
            Ok(())
        }

        async fn close(&self) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Factory handing out `MockPeerConnection`s and keeping them for inspection.
    #[derive(Debug)]
    pub struct MockPeerConnectionFactory {
        fail_at: Option<MockStep>,
        gathering_gate: Option<CancellationToken>,
        offer_sdp: String,
        connections: Mutex<Vec<Arc<MockPeerConnection>>>,
    }

    impl Default for MockPeerConnectionFactory {
        fn default() -> Self {
            Self {
                fail_at: None,
                gathering_gate: None,
                offer_sdp: MOCK_OFFER_SDP.to_string(),
                connections: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockPeerConnectionFactory {
        /// Connections that negotiate successfully.
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail every connection at `step`.
        #[must_use]
        pub fn failing_at(mut self, step: MockStep) -> Self {
            self.fail_at = Some(step);
            self
        }

        /// Hold ICE gathering until `gate` is cancelled.
        #[must_use]
        pub fn with_gathering_gate(mut self, gate: CancellationToken) -> Self {
            self.gathering_gate = Some(gate);
            self
        }

        /// Offer SDP produced after gathering.
        #[must_use]
        pub fn with_offer_sdp(mut self, sdp: &str) -> Self {
            self.offer_sdp = sdp.to_string();
            self
        }

        /// Every connection created so far, oldest first.
        pub fn connections(&self) -> Vec<Arc<MockPeerConnection>> {
            self.connections.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl PeerConnectionFactory for MockPeerConnectionFactory {
        async fn create(&self) -> Result<Arc<dyn PeerConnection>, PublishError> {
            if self.fail_at == Some(MockStep::Create) {
                return Err(PublishError::PeerConnection(
                    "injected Create failure".to_string(),
                ));
            }

            let connection = Arc::new(MockPeerConnection {
                fail_at: self.fail_at,
                gathering_gate: self.gathering_gate.clone(),
                offer_sdp: self.offer_sdp.clone(),
                tracks: Mutex::new(Vec::new()),
                answer: Mutex::new(None),
                close_count: AtomicUsize::new(0),
            });

            if let Ok(mut connections) = self.connections.lock() {
                connections.push(Arc::clone(&connection));
            }
            Ok(connection)
        }
    }
}
