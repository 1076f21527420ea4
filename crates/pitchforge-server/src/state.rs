//! Application state shared across handlers.

use pitchforge_config::AppConfig;
use pitchforge_fallback::FallbackChain;
use pitchforge_monitor::Monitor;
use pitchforge_resilience::RateLimiter;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Application state shared across all handlers
///
/// Every service object is constructed once at startup and injected here;
/// handlers never reach for globals.
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<AppConfig>,
    /// Provider fallback chain
    pub chain: Arc<FallbackChain>,
    /// Per-client rate limiter
    pub limiter: Arc<RateLimiter>,
    /// Metrics and regression monitor
    pub monitor: Arc<Monitor>,
    /// Cancelled on shutdown; in-flight requests stop scheduling attempts
    pub shutdown: CancellationToken,
    /// Process start time, reported as uptime by the health endpoint
    pub started_at: Instant,
}

impl AppState {
    /// Create a new application state builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Seconds since the server started
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Builder for application state
pub struct AppStateBuilder {
    config: Option<AppConfig>,
    chain: Option<FallbackChain>,
    limiter: Option<Arc<RateLimiter>>,
    monitor: Option<Arc<Monitor>>,
    shutdown: Option<CancellationToken>,
}

impl AppStateBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            chain: None,
            limiter: None,
            monitor: None,
            shutdown: None,
        }
    }

    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the provider fallback chain
    #[must_use]
    pub fn chain(mut self, chain: FallbackChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Set the rate limiter
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the monitor
    #[must_use]
    pub fn monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Set the shutdown token
    #[must_use]
    pub fn shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the application state
    ///
    /// # Panics
    /// Panics if the fallback chain is not set
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> AppState {
        let chain = self.chain.expect("fallback chain is required");

        AppState {
            config: Arc::new(self.config.unwrap_or_default()),
            chain: Arc::new(chain),
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::with_defaults())),
            monitor: self
                .monitor
                .unwrap_or_else(|| Arc::new(Monitor::with_defaults())),
            shutdown: self.shutdown.unwrap_or_default(),
            started_at: Instant::now(),
        }
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
