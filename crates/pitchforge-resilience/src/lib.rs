//! # Pitchforge Resilience
//!
//! Resilience patterns for the pitch generation service:
//! - Deterministic exponential backoff schedule
//! - Automatic retry loop with cooperative cancellation
//! - Manual retry budget with ticking cooldown
//! - Per-call deadline enforcement
//! - Fixed-window rate limiting per client key

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod rate_limiter;
pub mod retry;
pub mod timeout;

// Re-export main types
pub use backoff::BackoffPolicy;
pub use rate_limiter::{RateLimitDecision, RateLimiter, RateLimiterConfig};
pub use retry::{RetryHandle, RetryPolicy, RetryState, DEFAULT_TICK};
pub use timeout::with_deadline;
