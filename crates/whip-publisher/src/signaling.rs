//! WHIP signaling over HTTP.
//!
//! `POST {base}/{path}/whip` with the SDP offer, answered with the relay's
//! SDP and an optional `Location` naming the session resource. Teardown sends
//! `DELETE` to that resource.

use crate::errors::PublishError;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// SDP media type for WHIP bodies.
const APPLICATION_SDP: &str = "application/sdp";

/// Connect timeout for relay requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepted WHIP offer whose answer body has not been read yet.
///
/// The resource handle is available as soon as the relay accepts, so a
/// caller can take ownership of it before reading the answer.
#[derive(Debug)]
pub struct WhipResponse {
    resource_url: Option<String>,
    response: reqwest::Response,
}

impl WhipResponse {
    /// Absolute URL of the relay's session resource, if the relay named one.
    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.as_deref()
    }

    /// Read the remote session description.
    ///
    /// # Errors
    ///
    /// `PublishError::Signaling` if the body cannot be read.
    pub async fn answer(self) -> Result<String, PublishError> {
        self.response.text().await.map_err(|e| {
            warn!(target: "whip.signaling", error = %e, "Failed to read WHIP answer");
            PublishError::Signaling(format!("failed to read answer: {e}"))
        })
    }
}

/// WHIP HTTP client for one relay.
#[derive(Clone)]
pub struct WhipSignaling {
    client: Client,
    endpoint_base: String,
}

/// Reduce `value` to its origin, or trim trailing slashes if it is not a URL.
fn normalize_endpoint_base(value: &str) -> String {
    let value = value.trim();
    match Url::parse(value) {
        Ok(url) if url.origin().is_tuple() => url.origin().ascii_serialization(),
        _ => value.trim_end_matches('/').to_string(),
    }
}

impl WhipSignaling {
    /// # Errors
    ///
    /// `PublishError::Signaling` if the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "whip.signaling", error = %e, "Failed to build HTTP client");
                PublishError::Signaling(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint_base: normalize_endpoint_base(endpoint),
        })
    }

    pub fn endpoint_base(&self) -> &str {
        &self.endpoint_base
    }

    /// Signaling endpoint for `path`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}/whip", self.endpoint_base, path)
    }

    /// POST `sdp` for `path`.
    ///
    /// Returns once the relay accepts, with the resource handle resolved and
    /// the answer still unread.
    ///
    /// # Errors
    ///
    /// - `PublishError::Signaling` - transport failure, or a `Location` that
    ///   does not resolve to a URL
    /// - `PublishError::Rejected` - non-success status
    #[instrument(skip(self, sdp), name = "whip.signaling.offer")]
    pub async fn offer(&self, path: &str, sdp: String) -> Result<WhipResponse, PublishError> {
        let endpoint = self.endpoint_url(path);

        let response = self
            .client
            .post(&endpoint)
            .header(CONTENT_TYPE, APPLICATION_SDP)
            .header(ACCEPT, APPLICATION_SDP)
            .body(sdp)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "whip.signaling", error = %e, "WHIP request failed");
                PublishError::Signaling(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "whip.signaling", status = %status, "Relay rejected WHIP offer");
            return Err(PublishError::Rejected(status.as_u16()));
        }

        let resource_url = match response.headers().get(LOCATION) {
            Some(location) => Some(resolve_location(&endpoint, location.to_str().ok())?),
            None => None,
        };

        debug!(target: "whip.signaling", resource = ?resource_url, "Relay accepted WHIP offer");
        Ok(WhipResponse {
            resource_url,
            response,
        })
    }

    /// Best-effort DELETE of a session resource. Failures are logged.
    #[instrument(skip(self), name = "whip.signaling.delete")]
    pub async fn delete(&self, resource_url: &str) {
        match self.client.delete(resource_url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(target: "whip.signaling", "Deleted WHIP resource");
            }
            Ok(response) => {
                warn!(
                    target: "whip.signaling",
                    status = %response.status(),
                    "Relay refused WHIP resource delete"
                );
            }
            Err(e) => {
                error!(target: "whip.signaling", error = %e, "Failed to delete WHIP resource");
            }
        }
    }
}

/// Resolve a `Location` header against the endpoint it came from.
fn resolve_location(endpoint: &str, location: Option<&str>) -> Result<String, PublishError> {
    location
        .and_then(|location| Url::parse(endpoint).ok()?.join(location).ok())
        .map(String::from)
        .ok_or_else(|| PublishError::Signaling("invalid Location header".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signaling(endpoint: &str) -> WhipSignaling {
        WhipSignaling::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_base_is_origin() {
        assert_eq!(
            signaling("http://relay.example.com:8889/some/path/").endpoint_base(),
            "http://relay.example.com:8889"
        );
        assert_eq!(
            signaling("https://relay.example.com/").endpoint_base(),
            "https://relay.example.com"
        );
    }

    #[test]
    fn test_endpoint_base_falls_back_to_trimming() {
        assert_eq!(signaling("relay.local:8889//").endpoint_base(), "relay.local:8889");
        assert_eq!(signaling("/whip/").endpoint_base(), "/whip");
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            signaling("http://localhost:8889").endpoint_url("ABCD"),
            "http://localhost:8889/ABCD/whip"
        );
    }

    #[test]
    fn test_resolve_location() {
        let endpoint = "http://relay:8889/ABCD/whip";
        assert_eq!(
            resolve_location(endpoint, Some("/ABCD/whip/session-1")).unwrap(),
            "http://relay:8889/ABCD/whip/session-1"
        );
        assert_eq!(
            resolve_location(endpoint, Some("session-1")).unwrap(),
            "http://relay:8889/ABCD/session-1"
        );
        assert_eq!(
            resolve_location(endpoint, Some("https://other:9000/r/1")).unwrap(),
            "https://other:9000/r/1"
        );
        assert!(resolve_location(endpoint, None).is_err());
    }

    #[tokio::test]
    async fn test_offer_posts_sdp_and_reads_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ABCD/whip"))
            .and(header("content-type", "application/sdp"))
            .and(header("accept", "application/sdp"))
            .and(body_string("offer-sdp"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("location", "/ABCD/whip/session-1")
                    .set_body_string("answer-sdp"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = signaling(&server.uri())
            .offer("ABCD", "offer-sdp".to_string())
            .await
            .unwrap();

        assert_eq!(
            response.resource_url(),
            Some(format!("{}/ABCD/whip/session-1", server.uri()).as_str())
        );
        assert_eq!(response.answer().await.unwrap(), "answer-sdp");
    }

    #[tokio::test]
    async fn test_offer_without_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("answer-sdp"))
            .mount(&server)
            .await;

        let response = signaling(&server.uri())
            .offer("ABCD", "offer-sdp".to_string())
            .await
            .unwrap();

        assert_eq!(response.resource_url(), None);
    }

    #[tokio::test]
    async fn test_offer_rejected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad offer"))
            .mount(&server)
            .await;

        let result = signaling(&server.uri())
            .offer("ABCD", "offer-sdp".to_string())
            .await;

        assert!(matches!(result, Err(PublishError::Rejected(400))));
    }

    #[tokio::test]
    async fn test_offer_unreachable_relay() {
        let result = signaling("http://127.0.0.1:9")
            .offer("ABCD", "offer-sdp".to_string())
            .await;

        assert!(matches!(result, Err(PublishError::Signaling(_))));
    }

    #[tokio::test]
    async fn test_delete_sends_request() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/ABCD/whip/session-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        signaling(&server.uri())
            .delete(&format!("{}/ABCD/whip/session-1", server.uri()))
            .await;
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        signaling("http://127.0.0.1:9")
            .delete("http://127.0.0.1:9/ABCD/whip/session-1")
            .await;
    }
}
