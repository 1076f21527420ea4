//! Provider traits and abstractions.
//!
//! This module defines the core trait that pitch backends implement, the
//! per-provider chain configuration, and the attempt-observation hook used
//! by monitoring.

use crate::error::{ErrorKind, PitchError};
use crate::pitch::{Pitch, PitchRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock budget for a single provider call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(45);

/// Core trait for all pitch providers
///
/// Implementations must be safe to share across tasks; the fallback chain
/// holds them behind `Arc` and may call them concurrently.
#[async_trait]
pub trait PitchProvider: Send + Sync + 'static {
    /// Unique provider instance identifier
    fn id(&self) -> &str;

    /// Generate a pitch for the given request
    ///
    /// # Errors
    /// Returns `PitchError` on backend errors, timeouts, or malformed output
    async fn generate(&self, request: &PitchRequest) -> Result<Pitch, PitchError>;

    /// Per-call deadline; calls exceeding it are converted to timeouts
    fn call_timeout(&self) -> Duration {
        DEFAULT_CALL_TIMEOUT
    }
}

/// Chain-level configuration for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider identifier
    pub id: String,
    /// Chain position; lower values are tried first
    #[serde(default)]
    pub priority: u32,
    /// Attempt budget for this provider, including the first call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Disabled providers stay configured but are skipped by the chain
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    /// Create a config with defaults for the remaining fields
    #[must_use]
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            priority,
            max_attempts: default_max_attempts(),
            enabled: true,
        }
    }
}

/// How a single attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The attempt produced a pitch
    Success,
    /// The attempt failed with the given classification
    Failure(ErrorKind),
}

/// One provider call, as reported to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Provider that handled the attempt
    pub provider_id: String,
    /// Zero-based attempt index within this provider's budget
    pub attempt_index: u32,
    /// When the attempt started
    pub started_at: DateTime<Utc>,
    /// When the attempt finished
    pub finished_at: DateTime<Utc>,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
    /// Attempt duration in milliseconds
    pub latency_ms: u64,
    /// Error text for failed attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receives one record per provider attempt, success or failure
///
/// Implementations must not block; records are delivered synchronously from
/// the generation path.
pub trait AttemptObserver: Send + Sync {
    /// Called after each attempt completes
    fn on_attempt(&self, record: &AttemptRecord);
}

/// Observer that discards all records
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl AttemptObserver for NullObserver {
    fn on_attempt(&self, _record: &AttemptRecord) {}
}
