//! API error handling.
//!
//! Provides consistent error responses for the API.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use liveness_stream::LivenessError;
use serde::Serialize;
use serde_json::json;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Underlying error, when `message` describes the failed operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub error: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            error: None,
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Describe the failed operation; the previous message becomes `error`.
    pub fn context(mut self, message: impl Into<String>) -> Self {
        self.error = Some(std::mem::replace(&mut self.message, message.into()));
        self
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<LivenessError> for ApiError {
    fn from(err: LivenessError) -> Self {
        let message = err.to_string();
        match err {
            LivenessError::MalformedInput { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "MALFORMED_INPUT", message)
            }
            LivenessError::PayloadTooLarge { size, limit } => {
                ApiError::new(StatusCode::BAD_REQUEST, "PAYLOAD_TOO_LARGE", message)
                    .with_details(json!({ "size": size, "limit": limit }))
            }
            LivenessError::Transport { raw, .. } => {
                tracing::error!("Liveness stream failed: {}", message);
                let error = ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "TRANSPORT_ERROR",
                    message,
                );
                match raw {
                    Some(raw) => error.with_details(json!({ "raw": raw })),
                    None => error.with_details(json!({ "raw": "No raw response" })),
                }
            }
            LivenessError::InvalidResult { .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INVALID_RESULT", message)
            }
            LivenessError::Cancelled => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "CANCELLED", message)
            }
            LivenessError::Configuration { .. } => {
                tracing::error!("Configuration error: {}", message);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    message,
                )
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Liveness(e) => e.into(),
            Error::RemoteStatus { status, body } => {
                tracing::error!("Remote service returned HTTP {}", status);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "REMOTE_ERROR",
                    format!("Remote service returned HTTP {}", status),
                )
                .with_details(json!({ "status": status, "raw": body }))
            }
            Error::Http(e) => {
                tracing::error!("Remote request failed: {}", e);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "REMOTE_UNAVAILABLE",
                    e.to_string(),
                )
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Syntax and type errors are bad input like any other; only the content type
        // and body read failures keep axum's status.
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => rejection.status(),
        };
        ApiError::new(status, "MALFORMED_INPUT", rejection.body_text())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
