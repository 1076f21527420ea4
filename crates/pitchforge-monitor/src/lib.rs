//! # Pitchforge Monitor
//!
//! Observability for the pitch generation service:
//! - Rolling per-key metrics with regression detection
//! - Broadcast alert bus with subscriber isolation
//! - Attempt-level retry statistics and a recent-error log
//! - Structured logging setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod monitor;

// Re-export main types
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use monitor::{
    AlertType, ErrorLogEntry, HealthReport, MetricsSnapshot, Monitor, MonitorConfig, MonitorEvent,
    RegressionAlert, RetryStats, Severity,
};
