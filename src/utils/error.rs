//! Unified API error type shared by handlers, services, and repositories.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Result alias used throughout handlers and services
pub type ApiResult<T> = Result<T, ApiError>;

/// API error with an HTTP status and a user-facing message.
///
/// Construct through the named helpers so the status codes stay consistent
/// across the codebase.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self { status: StatusCode::UNPROCESSABLE_ENTITY, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_GATEWAY, message: message.into() }
    }

    /// Short label used when a panel failure is converted into a warning.
    pub fn kind(&self) -> &'static str {
        match self.status {
            StatusCode::UNPROCESSABLE_ENTITY => "ValidationError",
            StatusCode::NOT_FOUND => "NotFound",
            StatusCode::BAD_GATEWAY => "AdapterFailure",
            _ => "InternalError",
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::internal_error(format!("Database error: {}", err))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::bad_gateway(format!("Upstream request failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}
