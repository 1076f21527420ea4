//! Rate limiting using a fixed-window counter per key.
//!
//! Each key gets an independent window; counters roll over lazily on the
//! first check after the window elapses, so idle keys cost nothing until
//! the background sweeper reclaims them.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Window duration
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Requests allowed per key per window
    pub max_requests: u32,
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// How often the background sweeper reclaims expired windows
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            max_requests: 10,
            enabled: true,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request was allowed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
    /// Whole seconds the client should wait, set only on rejection
    pub retry_after_secs: Option<u64>,
}

/// Fixed-window counter state for a single key
#[derive(Debug)]
struct WindowEntry {
    /// Requests counted in the current window
    count: u32,
    /// When the current window ends
    window_reset_at: Instant,
}

/// Rate limiter with independent fixed windows per key
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// Get the active configuration
    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Check the rate limit for a key
    ///
    /// Rejected requests never consume budget: a client hammering a full
    /// window does not push its own reset further out.
    #[must_use]
    pub fn check(&self, key: &str) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision {
                allowed: true,
                remaining: self.config.max_requests,
                reset_after: Duration::ZERO,
                retry_after_secs: None,
            };
        }

        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_reset_at: now + self.config.window,
            });

        // Lazy rollover: the first check after expiry starts a fresh window
        if now >= entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = now + self.config.window;
        }

        let reset_after = entry.window_reset_at.saturating_duration_since(now);

        if entry.count >= self.config.max_requests {
            let retry_after = retry_after_secs(reset_after);
            warn!(
                key = %key,
                limit = self.config.max_requests,
                retry_after_secs = retry_after,
                "Rate limit exceeded"
            );
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_after,
                retry_after_secs: Some(retry_after),
            };
        }

        entry.count += 1;
        let remaining = self.config.max_requests - entry.count;
        debug!(
            key = %key,
            remaining,
            "Rate limit check passed"
        );
        RateLimitDecision {
            allowed: true,
            remaining,
            reset_after,
            retry_after_secs: None,
        }
    }

    /// Remove entries whose window has fully elapsed, returning how many
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            if now >= entry.window_reset_at {
                debug!(key = %key, "Cleaned up expired rate limit window");
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Get number of tracked keys
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Spawn the periodic sweeper task
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(
                        removed,
                        tracked = limiter.key_count(),
                        "Rate limiter sweep finished"
                    );
                }
            }
        })
    }
}

/// Whole seconds until the window resets, rounded up and never zero
fn retry_after_secs(reset_after: Duration) -> u64 {
    let secs = reset_after.as_millis().div_ceil(1000);
    u64::try_from(secs).unwrap_or(u64::MAX).max(1)
}
