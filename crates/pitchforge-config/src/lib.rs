//! # Pitchforge Configuration
//!
//! Configuration management for the pitch generation service, including:
//! - Configuration schema and validation
//! - Loading from YAML/TOML files
//! - Environment variable substitution and overrides

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

// Re-export main types
pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource};
pub use schema::{AppConfig, ProviderSettings, ServerConfig};
