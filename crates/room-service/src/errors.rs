//! Room service error types.
//!
//! Every error renders as the `{ok: false, ...}` envelope used by the store
//! surface. Internal details are logged server-side and never returned.

use crate::services::verification::VerificationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Room service error type.
///
/// Maps to HTTP status codes:
/// - Store: the store error's own status (400, 404, 500)
/// - Verification: 403 Forbidden
/// - InvalidBody: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Verification failed: {0}")]
    Verification(VerificationError),

    #[error("Invalid request body")]
    InvalidBody,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Store(err) => err.status_code(),
            ApiError::Verification(_) => 403,
            ApiError::InvalidBody => 400,
            ApiError::Unauthorized => 401,
            ApiError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error = match &self {
            ApiError::Store(err) => {
                if *err == StoreError::InternalServerError {
                    tracing::warn!(target: "room.api", "Store operation failed");
                }
                Some(err.as_str())
            }
            ApiError::Verification(err) => Some(err.as_str()),
            ApiError::InvalidBody | ApiError::Unauthorized => None,
            ApiError::Internal(reason) => {
                // Log actual reason server-side, return a bare envelope
                tracing::error!(target: "room.api", reason = %reason, "Internal error");
                None
            }
        };

        (status, Json(ErrorEnvelope { ok: false, error })).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::Store(StoreError::Unavailable).to_string(),
            "Store error: unavailable"
        );
        assert_eq!(
            ApiError::Verification(VerificationError::TimeoutOrDuplicate).to_string(),
            "Verification failed: timeout-or-duplicate"
        );
        assert_eq!(ApiError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(
            ApiError::Internal("boom".to_string()).to_string(),
            "Internal error: boom"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Store(StoreError::BadRequest).status_code(), 400);
        assert_eq!(ApiError::Store(StoreError::Unavailable).status_code(), 404);
        assert_eq!(
            ApiError::Store(StoreError::InternalServerError).status_code(),
            500
        );
        assert_eq!(
            ApiError::Verification(VerificationError::InternalError).status_code(),
            403
        );
        assert_eq!(ApiError::InvalidBody.status_code(), 400);
        assert_eq!(ApiError::Unauthorized.status_code(), 401);
        assert_eq!(ApiError::Internal(String::new()).status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_store_error() {
        let response = ApiError::Store(StoreError::Unavailable).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body, serde_json::json!({"ok": false, "error": "unavailable"}));
    }

    #[tokio::test]
    async fn test_into_response_verification_error() {
        let response =
            ApiError::Verification(VerificationError::InvalidInputResponse).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(
            body,
            serde_json::json!({"ok": false, "error": "invalid-input-response"})
        );
    }

    #[tokio::test]
    async fn test_into_response_bare_envelopes() {
        for (error, status) in [
            (ApiError::InvalidBody, StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ApiError::Internal("db exploded".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ] {
            let response = error.into_response();
            assert_eq!(response.status(), status);

            let body = read_body_json(response.into_body()).await;
            assert_eq!(body, serde_json::json!({"ok": false}));
        }
    }

    #[test]
    fn test_from_store_error() {
        let error: ApiError = StoreError::BadRequest.into();
        assert!(matches!(error, ApiError::Store(StoreError::BadRequest)));
    }
}
