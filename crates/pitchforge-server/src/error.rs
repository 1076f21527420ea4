//! API error handling.
//!
//! Maps the shared failure taxonomy onto consistent JSON error responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pitchforge_core::{ErrorKind, PitchError};
use serde::{Deserialize, Serialize};
use tracing::error;

/// API error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details
    pub error: ApiErrorDetail,
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Failure kind from the classifier, when one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Seconds until the rate limit window resets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// API error wrapper
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error type
    pub error_type: String,
    /// Error message
    pub message: String,
    /// Failure kind from the classifier
    pub kind: Option<ErrorKind>,
    /// Seconds until the rate limit window resets
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(
        status: StatusCode,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
            kind: None,
            retry_after_seconds: None,
        }
    }

    /// Bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            error: ApiErrorDetail {
                message: self.message.clone(),
                error_type: self.error_type,
                kind: self.kind,
                retry_after_seconds: self.retry_after_seconds,
            },
        };

        error!(
            status = %self.status,
            message = %self.message,
            "API error response"
        );

        let mut response = (self.status, Json(body)).into_response();

        if let Some(secs) = self.retry_after_seconds {
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<PitchError> for ApiError {
    fn from(err: PitchError) -> Self {
        let retry_after_seconds = match &err {
            PitchError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        };

        // Terminal conditions have no meaningful classifier kind to expose
        let kind = match &err {
            PitchError::Backend { .. }
            | PitchError::Timeout { .. }
            | PitchError::AllProvidersFailed { .. }
            | PitchError::Validation { .. } => Some(err.kind()),
            _ => None,
        };

        Self {
            status: err.status_code(),
            error_type: err.error_type().to_string(),
            message: err.to_string(),
            kind,
            retry_after_seconds,
        }
    }
}
