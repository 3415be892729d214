//! Session issuance integration tests.
//!
//! Covers `POST /api/session`: verification gating, code generation and
//! recording the code in the store.

use common::code::RandomSource;
use common::error::{CodeError, StoreError};
use common::secret::SecretString;
use room_service::services::{
    MockRoomStore, MockVerifier, TurnstileVerifier, VerificationError,
};
use room_test_utils::TestRoomServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Randomness source that always yields the same byte.
struct FixedSource(u8);

impl RandomSource for FixedSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), CodeError> {
        dest.fill(self.0);
        Ok(())
    }
}

async fn start_session(
    server: &TestRoomServer,
    body: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .post(format!("{}/api/session", server.url()))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await?)
}

#[tokio::test]
async fn test_session_issues_and_stores_code() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;

    let response = start_session(&server, r#"{"token":"valid-token"}"#).await?;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["ok"], true);

    let code = body["code"].as_str().unwrap_or_default().to_string();
    assert_eq!(code.len(), 4);
    assert!(code.bytes().all(|b| b.is_ascii_alphanumeric()));

    // The issued code is immediately readable through the store surface.
    let stored: serde_json::Value = reqwest::get(format!("{}/room/{}", server.url(), code))
        .await?
        .json()
        .await?;
    assert_eq!(stored["ok"], true);
    let created_at = stored["value"]["createdAt"].as_str().unwrap_or_default();
    assert!(created_at.ends_with('Z'), "createdAt {created_at:?}");

    Ok(())
}

#[tokio::test]
async fn test_session_code_comes_from_injected_source() -> Result<(), anyhow::Error> {
    // Byte 0 maps to the first charset entry.
    let server = TestRoomServer::builder()
        .code_source(Arc::new(FixedSource(0)))
        .spawn()
        .await?;

    let body: serde_json::Value = start_session(&server, r#"{"token":"t"}"#)
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({"ok": true, "code": "AAAA"}));

    assert!(server.room().get("AAAA").await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_verification_failure_returns_403_and_stores_nothing() -> Result<(), anyhow::Error> {
    let verifier = Arc::new(MockVerifier::failing(VerificationError::TimeoutOrDuplicate));
    let server = TestRoomServer::builder()
        .verifier(verifier.clone())
        .spawn()
        .await?;

    let response = start_session(&server, r#"{"token":"used-token"}"#).await?;
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": false, "error": "timeout-or-duplicate"})
    );

    assert_eq!(verifier.call_count(), 1);
    let status = server
        .room()
        .get_status()
        .await
        .map_err(|e| anyhow::anyhow!("status failed: {e}"))?;
    assert_eq!(status.records, 0);

    Ok(())
}

#[tokio::test]
async fn test_malformed_body_skips_verification() -> Result<(), anyhow::Error> {
    let verifier = Arc::new(MockVerifier::passing());
    let server = TestRoomServer::builder()
        .verifier(verifier.clone())
        .spawn()
        .await?;

    for body in ["", "{bad", "{}", r#"{"token":7}"#] {
        let response = start_session(&server, body).await?;
        assert_eq!(response.status(), 400, "body {body:?}");
        assert_eq!(
            response.json::<serde_json::Value>().await?,
            json!({"ok": false, "error": "bad-request"})
        );
    }

    let oversized = format!(r#"{{"token":"{}"}}"#, "x".repeat(2049));
    let response = start_session(&server, &oversized).await?;
    assert_eq!(response.status(), 400);

    assert_eq!(verifier.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_store_failure_is_reported() -> Result<(), anyhow::Error> {
    let store = Arc::new(MockRoomStore::accepting().with_create(Err(StoreError::InternalServerError)));
    let server = TestRoomServer::builder().store(store.clone()).spawn().await?;

    let response = start_session(&server, r#"{"token":"t"}"#).await?;
    assert_eq!(response.status(), 500);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": false, "error": "internal-server-error"})
    );
    assert_eq!(store.calls().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_session_with_turnstile_verifier() -> Result<(), anyhow::Error> {
    let siteverify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("secret=site-secret"))
        .and(body_string_contains("response=widget-token"))
        .and(body_string_contains("remoteip=203.0.113.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "challenge_ts": "2024-01-01T00:00:00Z",
            "hostname": "example.com"
        })))
        .expect(1)
        .mount(&siteverify)
        .await;

    let verifier = TurnstileVerifier::new(
        format!("{}/siteverify", siteverify.uri()),
        SecretString::from("site-secret"),
        Duration::from_secs(2),
    )
    .map_err(|e| anyhow::anyhow!("verifier: {e}"))?;

    let server = TestRoomServer::builder()
        .verifier(Arc::new(verifier))
        .spawn()
        .await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/session", server.url()))
        .header("content-type", "application/json")
        .header("CF-Connecting-IP", "203.0.113.9")
        .header("X-Forwarded-For", "198.51.100.1")
        .body(r#"{"token":"widget-token"}"#)
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_session_with_rejecting_turnstile() -> Result<(), anyhow::Error> {
    let siteverify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error-codes": ["invalid-input-response"]
        })))
        .mount(&siteverify)
        .await;

    let verifier = TurnstileVerifier::new(
        format!("{}/siteverify", siteverify.uri()),
        SecretString::from("site-secret"),
        Duration::from_secs(2),
    )
    .map_err(|e| anyhow::anyhow!("verifier: {e}"))?;

    let server = TestRoomServer::builder()
        .verifier(Arc::new(verifier))
        .spawn()
        .await?;

    let response = start_session(&server, r#"{"token":"forged"}"#).await?;
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": false, "error": "invalid-input-response"})
    );

    Ok(())
}
