//! API error types and handling.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rk_core::ReconcileError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request (invalid query parameter, malformed input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or unknown bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Another run holds the run lock.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The run could not start because the source of truth was unavailable.
    #[error("Reconciliation aborted: {0}")]
    RunAborted(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RunAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Conflict(_) => "RUN_IN_PROGRESS",
            ApiError::RunAborted(_) => "RUN_ABORTED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            ApiError::RunAborted(cause) => Some(serde_json::json!({ "cause": cause })),
            _ => None,
        };

        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::SourceUnavailable(cause) => ApiError::RunAborted(cause.to_string()),
        }
    }
}
