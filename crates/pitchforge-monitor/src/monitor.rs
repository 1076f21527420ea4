//! Rolling metrics and regression detection.
//!
//! The monitor keeps one [`MetricsSnapshot`] per key (a feature or a
//! provider id), folds every recorded event into it incrementally, and
//! evaluates regression checks once a key has enough samples. Alerts go
//! out on a broadcast bus so a slow or dropped subscriber never blocks
//! the others.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pitchforge_core::{AttemptObserver, AttemptOutcome, AttemptRecord, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Error rate above which a threshold alert is critical rather than high
const CRITICAL_ERROR_RATE: f64 = 0.10;

/// How many of the newest log entries count as "recent" for usage-drop checks
const RECENT_WINDOW: usize = 20;

/// Total sample count above which a key is expected to keep receiving traffic
const USAGE_DROP_MIN_TOTAL: u64 = 50;

/// Recent samples below this, for a key past the total above, signal a drop
const USAGE_DROP_FLOOR: usize = 5;

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Error rate above which an `ErrorThreshold` alert fires
    pub error_rate_threshold: f64,
    /// Moving average latency above which a `PerformanceDegradation` alert fires
    pub latency_threshold_ms: f64,
    /// Events required for a key before regression checks run
    pub min_samples: u64,
    /// Bounded event log capacity; oldest entries are evicted past it
    pub event_capacity: usize,
    /// How many recent error log entries the health report keeps
    pub recent_errors: usize,
    /// Interval between overall health sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Overall error rate above which the sweep logs degradation
    pub global_error_threshold: f64,
    /// Alert bus buffer per subscriber
    pub alert_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            error_rate_threshold: 0.10,
            latency_threshold_ms: 2000.0,
            min_samples: 10,
            event_capacity: 1000,
            recent_errors: 25,
            sweep_interval: Duration::from_secs(30),
            global_error_threshold: 0.05,
            alert_buffer: 64,
        }
    }
}

/// One observation fed to the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The operation succeeded
    Success,
    /// The operation failed
    Error {
        /// Failure description
        message: String,
    },
    /// A latency sample in milliseconds
    Performance {
        /// Observed latency
        latency_ms: f64,
    },
    /// The feature was used; counts toward volume only
    Usage,
}

/// Rolling aggregate metrics for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Events recorded for this key
    pub total_count: u64,
    /// Running error fraction over error/success events
    pub error_rate: f64,
    /// Running success fraction over error/success events
    pub success_rate: f64,
    /// Smoothed latency; each sample moves the average halfway toward it
    pub moving_avg_latency_ms: f64,
    /// When the key was last updated
    pub last_updated: DateTime<Utc>,
}

impl MetricsSnapshot {
    fn empty() -> Self {
        Self {
            total_count: 0,
            error_rate: 0.0,
            success_rate: 0.0,
            moving_avg_latency_ms: 0.0,
            last_updated: Utc::now(),
        }
    }
}

/// What kind of regression an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Error rate crossed the configured threshold
    ErrorThreshold,
    /// Moving average latency crossed the configured threshold
    PerformanceDegradation,
    /// A previously busy key stopped receiving traffic
    UsageDrop,
}

/// Alert severity, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Needs attention now
    Critical,
}

/// A threshold-crossing fact emitted to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionAlert {
    /// The key the regression was detected on
    pub key: String,
    /// Which check fired
    pub alert_type: AlertType,
    /// How bad it is
    pub severity: Severity,
    /// Human-readable summary
    pub message: String,
    /// Metrics at the moment the check fired
    pub snapshot: MetricsSnapshot,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
}

/// One entry in the recent-error log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    /// Provider the failure came from
    pub provider_id: String,
    /// Failure classification
    pub kind: ErrorKind,
    /// Failure description
    pub message: String,
    /// When the failure finished
    pub timestamp: DateTime<Utc>,
}

/// Attempt-level counters accumulated from the fallback chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    /// All attempts observed
    pub total_attempts: u64,
    /// Attempts with a non-zero index, i.e. actual retries
    pub retried_attempts: u64,
    /// Attempts that failed
    pub failed_attempts: u64,
    /// Attempts that succeeded
    pub succeeded_attempts: u64,
}

/// Read-only health summary for the health endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Failure counts keyed by classification
    pub error_counts: HashMap<ErrorKind, u64>,
    /// Most recent failures, newest first
    pub recent_errors: Vec<ErrorLogEntry>,
    /// Attempt-level retry counters
    pub retry: RetryStats,
    /// Keys with metrics
    pub tracked_keys: usize,
    /// Error rate aggregated across all keys, weighted by volume
    pub overall_error_rate: f64,
}

#[derive(Debug, Default)]
struct MonitorState {
    metrics: HashMap<String, MetricsSnapshot>,
    /// Keys of recent events in arrival order, for usage-drop detection
    events: VecDeque<String>,
    disabled_keys: HashSet<String>,
    error_counts: HashMap<ErrorKind, u64>,
    error_log: VecDeque<ErrorLogEntry>,
    retry_stats: RetryStats,
}

/// Metrics store and regression detector
pub struct Monitor {
    config: MonitorConfig,
    state: RwLock<MonitorState>,
    alerts: broadcast::Sender<RegressionAlert>,
}

impl Monitor {
    /// Create a monitor
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        let (alerts, _) = broadcast::channel(config.alert_buffer.max(1));
        Self {
            config,
            state: RwLock::new(MonitorState::default()),
            alerts,
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(MonitorConfig::default())
    }

    /// Get the active configuration
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Subscribe to regression alerts
    ///
    /// Every subscriber gets its own buffered queue; one falling behind or
    /// being dropped does not affect delivery to the rest.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegressionAlert> {
        self.alerts.subscribe()
    }

    /// Record one event for a key and run regression checks
    pub fn record(&self, key: &str, event: MonitorEvent) {
        let alerts = {
            let mut state = self.state.write();
            let state = &mut *state;

            if state.events.len() >= self.config.event_capacity {
                state.events.pop_front();
            }
            state.events.push_back(key.to_string());

            let snapshot = state
                .metrics
                .entry(key.to_string())
                .or_insert_with(MetricsSnapshot::empty);
            snapshot.total_count += 1;
            let n = snapshot.total_count as f64;
            match &event {
                MonitorEvent::Error { .. } => {
                    snapshot.error_rate = (snapshot.error_rate * (n - 1.0) + 1.0) / n;
                    snapshot.success_rate = (snapshot.success_rate * (n - 1.0)) / n;
                }
                MonitorEvent::Success => {
                    snapshot.error_rate = (snapshot.error_rate * (n - 1.0)) / n;
                    snapshot.success_rate = (snapshot.success_rate * (n - 1.0) + 1.0) / n;
                }
                MonitorEvent::Performance { latency_ms } => {
                    // keep this exact halving filter; dashboards are calibrated to it
                    snapshot.moving_avg_latency_ms =
                        (snapshot.moving_avg_latency_ms + latency_ms) / 2.0;
                }
                MonitorEvent::Usage => {}
            }
            snapshot.last_updated = Utc::now();

            let eligible = snapshot.total_count >= self.config.min_samples
                && !state.disabled_keys.contains(key);
            if eligible {
                let snapshot = snapshot.clone();
                self.evaluate(key, &snapshot, &state.events)
            } else {
                Vec::new()
            }
        };

        for alert in alerts {
            warn!(
                key = %alert.key,
                alert_type = ?alert.alert_type,
                severity = ?alert.severity,
                message = %alert.message,
                "Regression detected"
            );
            // no subscribers is fine; alerts are advisory
            let _ = self.alerts.send(alert);
        }
    }

    /// Run the three regression checks against a fresh snapshot
    fn evaluate(
        &self,
        key: &str,
        snapshot: &MetricsSnapshot,
        events: &VecDeque<String>,
    ) -> Vec<RegressionAlert> {
        let mut alerts = Vec::new();
        let now = Utc::now();

        if snapshot.error_rate > self.config.error_rate_threshold {
            let severity = if snapshot.error_rate > CRITICAL_ERROR_RATE {
                Severity::Critical
            } else {
                Severity::High
            };
            alerts.push(RegressionAlert {
                key: key.to_string(),
                alert_type: AlertType::ErrorThreshold,
                severity,
                message: format!(
                    "error rate {:.1}% exceeds threshold {:.1}%",
                    snapshot.error_rate * 100.0,
                    self.config.error_rate_threshold * 100.0
                ),
                snapshot: snapshot.clone(),
                timestamp: now,
            });
        }

        if snapshot.moving_avg_latency_ms > self.config.latency_threshold_ms {
            let severity = if snapshot.moving_avg_latency_ms > 2.0 * self.config.latency_threshold_ms
            {
                Severity::High
            } else {
                Severity::Medium
            };
            alerts.push(RegressionAlert {
                key: key.to_string(),
                alert_type: AlertType::PerformanceDegradation,
                severity,
                message: format!(
                    "moving average latency {:.0}ms exceeds threshold {:.0}ms",
                    snapshot.moving_avg_latency_ms, self.config.latency_threshold_ms
                ),
                snapshot: snapshot.clone(),
                timestamp: now,
            });
        }

        if snapshot.total_count > USAGE_DROP_MIN_TOTAL {
            let recent = events
                .iter()
                .rev()
                .take(RECENT_WINDOW)
                .filter(|event_key| event_key.as_str() == key)
                .count();
            if recent < USAGE_DROP_FLOOR {
                alerts.push(RegressionAlert {
                    key: key.to_string(),
                    alert_type: AlertType::UsageDrop,
                    severity: Severity::Medium,
                    message: format!(
                        "only {recent} of the last {RECENT_WINDOW} events hit this key despite {} total",
                        snapshot.total_count
                    ),
                    snapshot: snapshot.clone(),
                    timestamp: now,
                });
            }
        }

        alerts
    }

    /// Enable or disable regression checks for a key; recording continues either way
    pub fn set_enabled(&self, key: &str, enabled: bool) {
        let mut state = self.state.write();
        if enabled {
            state.disabled_keys.remove(key);
        } else {
            state.disabled_keys.insert(key.to_string());
        }
    }

    /// Get the current snapshot for a key
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<MetricsSnapshot> {
        self.state.read().metrics.get(key).cloned()
    }

    /// Drop a key's metrics and its entries in the event log
    pub fn clear(&self, key: &str) {
        let mut state = self.state.write();
        state.metrics.remove(key);
        state.events.retain(|event_key| event_key != key);
    }

    /// Events currently held in the bounded log
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.state.read().events.len()
    }

    /// Build the read-only health summary
    #[must_use]
    pub fn health_report(&self) -> HealthReport {
        let state = self.state.read();
        HealthReport {
            error_counts: state.error_counts.clone(),
            recent_errors: state.error_log.iter().rev().cloned().collect(),
            retry: state.retry_stats,
            tracked_keys: state.metrics.len(),
            overall_error_rate: Self::overall_error_rate(&state),
        }
    }

    /// Aggregate error rate across keys and log degradation
    ///
    /// Advisory only; this never emits alerts.
    pub fn health_sweep(&self) -> f64 {
        let rate = {
            let state = self.state.read();
            Self::overall_error_rate(&state)
        };
        if rate > self.config.global_error_threshold {
            warn!(
                error_rate = rate,
                threshold = self.config.global_error_threshold,
                "Overall error rate above threshold"
            );
        } else {
            debug!(error_rate = rate, "Health sweep finished");
        }
        rate
    }

    /// Spawn the periodic health sweep task
    pub fn spawn_health_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.health_sweep();
            }
        })
    }

    /// Volume-weighted error rate over all keys
    fn overall_error_rate(state: &MonitorState) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0u64;
        for snapshot in state.metrics.values() {
            weighted += snapshot.error_rate * snapshot.total_count as f64;
            total += snapshot.total_count;
        }
        if total == 0 {
            0.0
        } else {
            weighted / total as f64
        }
    }
}

impl AttemptObserver for Monitor {
    fn on_attempt(&self, record: &AttemptRecord) {
        {
            let mut state = self.state.write();
            state.retry_stats.total_attempts += 1;
            if record.attempt_index > 0 {
                state.retry_stats.retried_attempts += 1;
            }
            match record.outcome {
                AttemptOutcome::Success => state.retry_stats.succeeded_attempts += 1,
                AttemptOutcome::Failure(kind) => {
                    state.retry_stats.failed_attempts += 1;
                    *state.error_counts.entry(kind).or_insert(0) += 1;
                    if state.error_log.len() >= self.config.recent_errors {
                        state.error_log.pop_front();
                    }
                    state.error_log.push_back(ErrorLogEntry {
                        provider_id: record.provider_id.clone(),
                        kind,
                        message: record.error.clone().unwrap_or_default(),
                        timestamp: record.finished_at,
                    });
                }
            }
        }

        // per-provider trend metrics ride the same recording path
        match record.outcome {
            AttemptOutcome::Success => {
                self.record(&record.provider_id, MonitorEvent::Success);
                self.record(
                    &record.provider_id,
                    MonitorEvent::Performance {
                        latency_ms: record.latency_ms as f64,
                    },
                );
            }
            AttemptOutcome::Failure(_) => {
                self.record(
                    &record.provider_id,
                    MonitorEvent::Error {
                        message: record.error.clone().unwrap_or_default(),
                    },
                );
            }
        }
    }
}
