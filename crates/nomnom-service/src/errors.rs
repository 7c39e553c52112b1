//! NomNom service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use crate::services::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// NomNom service error type.
///
/// Maps to appropriate HTTP status codes:
/// - Database, Internal: 500 Internal Server Error
/// - NotFound: 404 Not Found
/// - Forbidden: 403 Forbidden
/// - BadRequest: 400 Bad Request
/// - Storage, ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum NomnomError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl NomnomError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            NomnomError::Database(_) | NomnomError::Internal => 500,
            NomnomError::NotFound(_) => 404,
            NomnomError::Forbidden(_) => 403,
            NomnomError::BadRequest(_) => 400,
            NomnomError::Storage(_) | NomnomError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for NomnomError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            NomnomError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "nomnom.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            NomnomError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            NomnomError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            NomnomError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            NomnomError::Storage(err) => {
                tracing::error!(target: "nomnom.storage", error = %err, "Packet storage request failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_UNAVAILABLE",
                    "Packet storage is temporarily unavailable".to_string(),
                )
            }
            NomnomError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "nomnom.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            NomnomError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to NomnomError
impl From<sqlx::Error> for NomnomError {
    fn from(err: sqlx::Error) -> Self {
        NomnomError::Database(err.to_string())
    }
}

impl From<StorageError> for NomnomError {
    fn from(err: StorageError) -> Self {
        NomnomError::Storage(err.to_string())
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
    fn test_display_messages() {
        assert_eq!(
            NomnomError::Database("connection failed".to_string()).to_string(),
            "Database error: connection failed"
        );
        assert_eq!(
            NomnomError::NotFound("election".to_string()).to_string(),
            "Not found: election"
        );
        assert_eq!(
            NomnomError::Storage("listing failed".to_string()).to_string(),
            "Storage error: listing failed"
        );
        assert_eq!(NomnomError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(NomnomError::Database("test".to_string()).status_code(), 500);
        assert_eq!(NomnomError::NotFound("test".to_string()).status_code(), 404);
        assert_eq!(NomnomError::Forbidden("test".to_string()).status_code(), 403);
        assert_eq!(NomnomError::BadRequest("test".to_string()).status_code(), 400);
        assert_eq!(NomnomError::Storage("test".to_string()).status_code(), 503);
        assert_eq!(
            NomnomError::ServiceUnavailable("test".to_string()).status_code(),
            503
        );
        assert_eq!(NomnomError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_database_error_is_generic() {
        let response = NomnomError::Database("relation \"ranks\" does not exist".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "An internal database error occurred"
        );
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = NomnomError::NotFound("Election not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "NOT_FOUND");
        assert_eq!(body_json["error"]["message"], "Election not found");
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let response = NomnomError::Forbidden("Voting is not open to you".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_into_response_storage_hides_cause() {
        let response =
            NomnomError::Storage("AccessDenied: bucket hugo-packet".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "STORAGE_UNAVAILABLE");
        let message = body_json["error"]["message"].as_str().unwrap();
        assert!(!message.contains("hugo-packet"));
    }

    #[test]
    fn test_from_storage_error() {
        let err: NomnomError = StorageError::Listing("timeout".to_string()).into();
        assert!(matches!(err, NomnomError::Storage(msg) if msg.contains("timeout")));
    }
}
