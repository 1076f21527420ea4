//! Error taxonomy and failure classification.
//!
//! [`PitchError::kind`] and [`PitchError::is_retryable`] are the single
//! classification point for the whole workspace: backend adapters fold raw
//! transport failures into one of the [`ErrorKind`] categories, and the
//! retry/fallback layers consult nothing else when deciding what to do with
//! a failure. Classification is deterministic and side-effect free.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category assigned to a failure.
///
/// Anything that cannot be recognized classifies as [`ErrorKind::Unknown`]
/// rather than raising a secondary error about classification itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection-level failure before any response arrived
    Network,
    /// The request was rejected as invalid
    Validation,
    /// A deadline elapsed before the call finished
    Timeout,
    /// The backend answered with a server-side (5xx) failure
    Server,
    /// The backend answered with a service-specific failure (overload, quota)
    BackendService,
    /// Unrecognized failure
    Unknown,
}

impl ErrorKind {
    /// Default retryability for this kind, used when the failure carries no
    /// explicit override.
    #[must_use]
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Server | Self::BackendService
        )
    }

    /// Stable string form used in logs and health reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::BackendService => "backend_service",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type used throughout the workspace
pub type PitchResult<T> = Result<T, PitchError>;

/// Main error type for pitch generation
#[derive(Debug, Error)]
pub enum PitchError {
    /// Request validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
        /// Field that failed validation, when known
        field: Option<String>,
    },

    /// The client exceeded its request budget for the current window
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Whole seconds until the window resets, rounded up
        retry_after_secs: u64,
        /// Admitted requests per window
        limit: u32,
    },

    /// A backend call failed
    #[error("Provider '{provider}' failed: {message}")]
    Backend {
        /// Provider that produced the failure
        provider: String,
        /// Classified category
        kind: ErrorKind,
        /// Failure description from the backend or transport
        message: String,
        /// HTTP status, when the backend answered at all
        status: Option<u16>,
        /// Explicit retryability override; `None` falls back to the kind's
        /// default
        retryable: Option<bool>,
    },

    /// A backend call exceeded its deadline
    #[error("Provider '{provider}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// Provider whose call was cut off
        provider: String,
        /// The deadline that elapsed, in milliseconds
        elapsed_ms: u64,
    },

    /// Every enabled provider in the chain was exhausted
    #[error("All providers failed after {attempts} attempts: {last_message}")]
    AllProvidersFailed {
        /// Attempts consumed across the whole chain
        attempts: u32,
        /// Kind of the last failure observed
        last_kind: ErrorKind,
        /// Message of the last failure observed
        last_message: String,
    },

    /// The request was cancelled before it resolved
    #[error("Request cancelled")]
    Cancelled,

    /// Deployment-level misconfiguration (missing credentials, empty chain)
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is misconfigured
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },
}

impl PitchError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a backend error that uses the kind's default retryability
    pub fn backend(
        provider: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            provider: provider.into(),
            kind,
            message: message.into(),
            status: None,
            retryable: None,
        }
    }

    /// Create a backend error carrying the HTTP status it came from
    pub fn backend_with_status(
        provider: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Backend {
            provider: provider.into(),
            kind,
            message: message.into(),
            status: Some(status),
            retryable: None,
        }
    }

    /// Create a backend error with an explicit retryability override
    pub fn backend_override(
        provider: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Backend {
            provider: provider.into(),
            kind,
            message: message.into(),
            status: None,
            retryable: Some(retryable),
        }
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            provider: provider.into(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classified category of this failure.
    ///
    /// `AllProvidersFailed` reports the kind of the last failure it absorbed
    /// so downstream presentation keeps the original category; the variant
    /// itself stays distinguishable by matching.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Backend { kind, .. } => *kind,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::AllProvidersFailed { last_kind, .. } => *last_kind,
            Self::RateLimited { .. }
            | Self::Cancelled
            | Self::Configuration { .. }
            | Self::Internal { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether the retry engine may try again after this failure.
    ///
    /// An explicit override on a backend failure wins; otherwise the kind's
    /// default applies. Terminal conditions (chain exhaustion, cancellation)
    /// are never retryable regardless of the kind they carry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend {
                retryable: Some(flag),
                ..
            } => *flag,
            Self::Backend {
                kind,
                retryable: None,
                ..
            } => kind.default_retryable(),
            Self::Timeout { .. } => true,
            Self::Validation { .. }
            | Self::RateLimited { .. }
            | Self::AllProvidersFailed { .. }
            | Self::Cancelled
            | Self::Configuration { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// HTTP status code for this error.
    ///
    /// Exhaustion keeps the terminal failure visible: when the last provider
    /// died on a timeout the response is 408, not a generic 503.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::AllProvidersFailed {
                last_kind: ErrorKind::Timeout,
                ..
            } => StatusCode::REQUEST_TIMEOUT,
            Self::AllProvidersFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cancelled | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error type string for API responses
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::Backend { .. } => "backend_error",
            Self::Timeout { .. } => "timeout",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::Cancelled => "cancelled",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}
