//! Exponential backoff schedule shared by automatic and manual retries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff policy configuration
///
/// The delay for attempt `n` (zero-based) is `base_delay * multiplier^n`,
/// capped at `max_delay`. There is no jitter; the schedule is deterministic
/// so clients and tests can predict cooldowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Growth factor applied per attempt
    pub multiplier: f64,
    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with explicit parameters
    #[must_use]
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// Delay to wait after the given zero-based attempt fails
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.multiplier.powf(f64::from(attempt))).min(max_ms);
        Duration::from_millis(delay_ms as u64)
    }
}
