//! WHIP publisher state machine.
//!
//! `Idle -> Negotiating -> Publishing -> Stopped`. Any failure during
//! negotiation leads to `Stopped`. A stopped publisher can be started again.
//!
//! At most one session is live at a time: `start` tears down the previous
//! session before acquiring anything new. Every session carries a generation
//! number, and callbacks from a session (track "ended" observers, a
//! negotiation that outlived a `stop`) act only while their generation is the
//! live one.

use crate::config::PublisherConfig;
use crate::errors::PublishError;
use crate::media::MediaStream;
use crate::peer::{PeerConnection, PeerConnectionFactory, WebRtcPeerConnectionFactory};
use crate::signaling::WhipSignaling;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Observable publisher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Idle,
    Negotiating,
    Publishing,
    Stopped,
}

/// Resources owned by the live session.
struct ActiveSession {
    generation: u64,
    peer: Arc<dyn PeerConnection>,
    stream: MediaStream,
    resource_url: Option<String>,
    /// Cancelled on teardown to retire the session's ended observers.
    observers: CancellationToken,
}

struct Shared {
    factory: Arc<dyn PeerConnectionFactory>,
    signaling: WhipSignaling,
    ice_gathering_timeout: Option<Duration>,
    session: Mutex<Option<ActiveSession>>,
    latest_generation: AtomicU64,
    state: watch::Sender<PublisherState>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest_generation.load(Ordering::SeqCst) == generation
    }

    fn set_state_if_latest(&self, generation: u64, state: PublisherState) {
        if self.is_latest(generation) {
            self.state.send_replace(state);
        }
    }

    /// Release everything a detached session owns.
    async fn release(&self, session: ActiveSession) {
        debug!(target: "whip.publisher", generation = session.generation, "Releasing session");
        session.observers.cancel();

        session.peer.close().await;
        session.stream.stop();

        if let Some(resource_url) = session.resource_url {
            self.signaling.delete(&resource_url).await;
        }
    }

    /// Tear down whatever session is live.
    async fn stop(&self) {
        let detached = self.session().take();

        self.state.send_if_modified(|state| {
            let changed = *state != PublisherState::Idle && *state != PublisherState::Stopped;
            if changed {
                *state = PublisherState::Stopped;
            }
            changed
        });

        if let Some(session) = detached {
            self.release(session).await;
            info!(target: "whip.publisher", "Publisher stopped");
        }
    }

    /// Tear down the live session only if it is `generation`.
    async fn stop_if_current(&self, generation: u64) {
        let detached = {
            let mut session = self.session();
            match session.as_ref() {
                Some(active) if active.generation == generation => session.take(),
                _ => None,
            }
        };

        if let Some(session) = detached {
            self.set_state_if_latest(generation, PublisherState::Stopped);
            self.release(session).await;
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = session.as_ref() {
            active.observers.cancel();
        }
    }
}

/// Publishes one media stream at a time to a WHIP relay.
#[derive(Clone)]
pub struct WhipPublisher {
    shared: Arc<Shared>,
}

impl WhipPublisher {
    /// Publisher over webrtc-rs for the relay named in `config`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client or the WebRTC API cannot be built.
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        let signaling = WhipSignaling::new(&config.whip_endpoint, config.request_timeout)?;
        let factory = Arc::new(WebRtcPeerConnectionFactory::new()?);
        Ok(Self::with_factory(
            signaling,
            factory,
            config.ice_gathering_timeout,
        ))
    }

    /// Publisher with an explicit peer connection factory.
    ///
    /// `ice_gathering_timeout` of `None` waits for gathering indefinitely.
    pub fn with_factory(
        signaling: WhipSignaling,
        factory: Arc<dyn PeerConnectionFactory>,
        ice_gathering_timeout: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(PublisherState::Idle);
        Self {
            shared: Arc::new(Shared {
                factory,
                signaling,
                ice_gathering_timeout,
                session: Mutex::new(None),
                latest_generation: AtomicU64::new(0),
                state,
            }),
        }
    }

    pub fn state(&self) -> PublisherState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PublisherState> {
        self.shared.state.subscribe()
    }

    /// Relay resource of the live session, if the relay named one.
    pub fn resource_url(&self) -> Option<String> {
        self.shared
            .session()
            .as_ref()
            .and_then(|session| session.resource_url.clone())
    }

    /// Publish `stream` under `path`.
    ///
    /// Tears down any previous session first. On failure every resource
    /// acquired by this attempt is released before the error is returned,
    /// and the publisher remains usable.
    ///
    /// # Errors
    ///
    /// - `PublishError::EmptyStream` - `stream` has no tracks
    /// - `PublishError::IceGatheringTimeout` - gathering exceeded the configured bound
    /// - `PublishError::Rejected` - the relay refused the offer
    /// - `PublishError::Superseded` - `stop` or another `start` won the race
    /// - peer connection and signaling failures
    #[instrument(skip(self, stream), name = "whip.publisher.start")]
    pub async fn start(&self, stream: MediaStream, path: &str) -> Result<(), PublishError> {
        if stream.is_empty() {
            return Err(PublishError::EmptyStream);
        }

        self.shared.stop().await;

        let generation = self.shared.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state.send_replace(PublisherState::Negotiating);
        info!(target: "whip.publisher", generation, "Starting publish session");

        match self.negotiate(generation, stream, path).await {
            Ok(()) => {
                self.shared
                    .set_state_if_latest(generation, PublisherState::Publishing);
                info!(target: "whip.publisher", generation, "Publishing");
                Ok(())
            }
            Err(e) => {
                warn!(target: "whip.publisher", generation, error = %e, "Publish attempt failed");
                self.shared.stop_if_current(generation).await;
                self.shared
                    .set_state_if_latest(generation, PublisherState::Stopped);
                Err(e)
            }
        }
    }

    /// Tear down the live session. Idempotent.
    #[instrument(skip(self), name = "whip.publisher.stop")]
    pub async fn stop(&self) {
        self.shared.stop().await;
    }

    async fn negotiate(
        &self,
        generation: u64,
        stream: MediaStream,
        path: &str,
    ) -> Result<(), PublishError> {
        // Until the session is installed, this attempt alone owns `stream`.
        let peer = match self.shared.factory.create().await {
            Ok(peer) => peer,
            Err(e) => {
                stream.stop();
                return Err(e);
            }
        };
        let observers = CancellationToken::new();

        let superseded = {
            let mut session = self.shared.session();
            if self.shared.is_latest(generation) {
                Some(session.replace(ActiveSession {
                    generation,
                    peer: Arc::clone(&peer),
                    stream: stream.clone(),
                    resource_url: None,
                    observers: observers.clone(),
                }))
            } else {
                None
            }
        };
        match superseded {
            // A concurrent start installed its session between our teardown and now.
            Some(Some(previous)) => self.shared.release(previous).await,
            Some(None) => {}
            None => {
                observers.cancel();
                peer.close().await;
                stream.stop();
                return Err(PublishError::Superseded);
            }
        }

        for track in stream.tracks() {
            peer.add_track(track).await?;
            self.observe_ended(generation, track.ended(), observers.clone());
        }

        peer.create_offer().await?;
        let offer = match self.shared.ice_gathering_timeout {
            Some(limit) => tokio::time::timeout(limit, peer.gathered_offer())
                .await
                .map_err(|_| PublishError::IceGatheringTimeout(limit))??,
            None => peer.gathered_offer().await?,
        };

        let response = self.shared.signaling.offer(path, offer).await?;

        // Record the relay resource before reading the answer, so teardown
        // deletes it even if the body never arrives.
        if let Some(resource_url) = response.resource_url() {
            let stored = {
                let mut session = self.shared.session();
                match session.as_mut() {
                    Some(active) if active.generation == generation => {
                        active.resource_url = Some(resource_url.to_string());
                        true
                    }
                    _ => false,
                }
            };
            if !stored {
                // Nobody owns this resource anymore.
                self.shared.signaling.delete(resource_url).await;
                return Err(PublishError::Superseded);
            }
        }

        let answer = response.answer().await?;
        peer.set_answer(answer).await?;

        let live = self
            .shared
            .session()
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if !live {
            return Err(PublishError::Superseded);
        }

        Ok(())
    }

    /// Tear down session `generation` when the track's source ends.
    fn observe_ended(&self, generation: u64, ended: CancellationToken, retired: CancellationToken) {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                _ = ended.cancelled() => {
                    if let Some(shared) = shared.upgrade() {
                        info!(target: "whip.publisher", generation, "Track ended, stopping session");
                        shared.stop_if_current(generation).await;
                    }
                }
                _ = retired.cancelled() => {}
            }
        });
    }
}
