//! Session Code Store HTTP surface integration tests.
//!
//! Drives `/room/:key` through the real router and checks both status codes
//! and envelope bodies.

use room_test_utils::TestRoomServer;
use serde_json::json;

async fn put(
    client: &reqwest::Client,
    server: &TestRoomServer,
    key: &str,
    body: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(client
        .put(format!("{}/room/{}", server.url(), key))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await?)
}

#[tokio::test]
async fn test_create_get_remove_lifecycle() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();
    let url = format!("{}/room/ABCD", server.url());

    let response = put(&client, &server, "ABCD", r#"{"createdAt":"2024-01-01T00:00:00Z"}"#).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<serde_json::Value>().await?, json!({"ok": true}));

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": true, "value": {"createdAt": "2024-01-01T00:00:00Z"}})
    );

    let response = client.delete(&url).send().await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<serde_json::Value>().await?, json!({"ok": true}));

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": false, "error": "unavailable"})
    );

    Ok(())
}

#[tokio::test]
async fn test_get_missing_returns_unavailable() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;

    let response = reqwest::get(format!("{}/room/ZZZZ", server.url())).await?;
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": false, "error": "unavailable"})
    );

    Ok(())
}

#[tokio::test]
async fn test_invalid_keys_return_bad_request() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    for key in ["ABC", "ABCDE", "AB-D", "AB%20D"] {
        let url = format!("{}/room/{}", server.url(), key);

        let response = client.get(&url).send().await?;
        assert_eq!(response.status(), 400, "GET {key}");
        assert_eq!(
            response.json::<serde_json::Value>().await?,
            json!({"ok": false, "error": "bad-request"})
        );

        let response = put(&client, &server, key, r#"{"createdAt":"2024-01-01T00:00:00Z"}"#).await?;
        assert_eq!(response.status(), 400, "PUT {key}");

        let response = client.delete(&url).send().await?;
        assert_eq!(response.status(), 400, "DELETE {key}");
    }

    let status = server
        .room()
        .get_status()
        .await
        .map_err(|e| anyhow::anyhow!("status failed: {e}"))?;
    assert_eq!(status.records, 0);

    Ok(())
}

#[tokio::test]
async fn test_put_malformed_body_returns_bad_request() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    for body in [
        "",
        "{invalid",
        "{}",
        r#"{"createdAt":"yesterday"}"#,
        r#"{"createdAt":"2024-01-01T00:00:00+09:00"}"#,
        r#"{"createdAt":12}"#,
    ] {
        let response = put(&client, &server, "ABCD", body).await?;
        assert_eq!(response.status(), 400, "body {body:?}");
        assert_eq!(
            response.json::<serde_json::Value>().await?,
            json!({"ok": false, "error": "bad-request"})
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_put_overwrites_existing_record() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    put(&client, &server, "ABCD", r#"{"createdAt":"2024-01-01T00:00:00Z"}"#).await?;
    let response = put(&client, &server, "ABCD", r#"{"createdAt":"2025-02-02T10:00:00.500Z"}"#).await?;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = reqwest::get(format!("{}/room/ABCD", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(body["value"]["createdAt"], "2025-02-02T10:00:00.500Z");

    Ok(())
}

#[tokio::test]
async fn test_put_strips_unknown_fields() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = put(
        &client,
        &server,
        "ABCD",
        r#"{"createdAt":"2024-01-01T00:00:00Z","owner":"mallory"}"#,
    )
    .await?;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = reqwest::get(format!("{}/room/ABCD", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(body["value"], json!({"createdAt": "2024-01-01T00:00:00Z"}));

    Ok(())
}

#[tokio::test]
async fn test_delete_missing_returns_unavailable() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .delete(format!("{}/room/ABCD", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({"ok": false, "error": "unavailable"})
    );

    Ok(())
}

#[tokio::test]
async fn test_unsupported_method_returns_405() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/room/ABCD", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 405);

    Ok(())
}
