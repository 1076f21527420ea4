//! Configuration schema definitions.
//!
//! This module defines all configuration types with validation and defaults.

use pitchforge_core::{PitchError, PitchResult, ProviderConfig};
use pitchforge_monitor::{LoggingConfig, MonitorConfig};
use pitchforge_resilience::{BackoffPolicy, RateLimiterConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::{Validate, ValidationError, ValidationErrors};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Provider configurations, tried in priority order
    #[validate(nested)]
    pub providers: Vec<ProviderSettings>,

    /// Rate limiter configuration
    pub rate_limit: RateLimiterConfig,

    /// Retry backoff configuration
    pub retry: BackoffPolicy,

    /// Monitoring configuration
    pub monitoring: MonitorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns validation errors if configuration is invalid
    pub fn validate_config(&self) -> Result<(), ValidationErrors> {
        self.validate()?;

        let mut errors = ValidationErrors::new();

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.as_str()) {
                let mut error = ValidationError::new("duplicate_provider_id");
                error.message = Some(format!("duplicate provider id: {}", provider.id).into());
                errors.add("providers", error);
            }
        }

        if self.rate_limit.max_requests == 0 {
            let mut error = ValidationError::new("max_requests");
            error.message = Some("rate_limit.max_requests must be at least 1".into());
            errors.add("rate_limit", error);
        }

        if self.rate_limit.window < Duration::from_secs(1) {
            let mut error = ValidationError::new("window");
            error.message = Some("rate_limit.window must be at least 1 second".into());
            errors.add("rate_limit", error);
        }

        if !(1.0..=10.0).contains(&self.retry.multiplier) {
            let mut error = ValidationError::new("multiplier");
            error.message = Some("retry.multiplier must be between 1.0 and 10.0".into());
            errors.add("retry", error);
        }

        if self.monitoring.error_rate_threshold <= 0.0 || self.monitoring.error_rate_threshold > 1.0
        {
            let mut error = ValidationError::new("error_rate_threshold");
            error.message =
                Some("monitoring.error_rate_threshold must be within (0.0, 1.0]".into());
            errors.add("monitoring", error);
        }

        if self.monitoring.latency_threshold_ms <= 0.0 {
            let mut error = ValidationError::new("latency_threshold_ms");
            error.message = Some("monitoring.latency_threshold_ms must be positive".into());
            errors.add("monitoring", error);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Get the socket address
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderSettings {
    /// Unique provider instance ID
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// Position in the fallback chain (lower = tried first)
    #[serde(default)]
    pub priority: u32,

    /// Attempt budget per request, including the initial call
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Whether this provider participates in the chain
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API base URL
    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    /// Model to request
    #[serde(default = "default_model")]
    pub model: String,

    /// API key, either a literal or a ${ENV_VAR} reference
    #[serde(default)]
    pub api_key: String,

    /// Per-call deadline
    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub call_timeout: Duration,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(45)
}

impl ProviderSettings {
    /// Create provider settings with defaults
    #[must_use]
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            priority,
            max_attempts: default_max_attempts(),
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: String::new(),
            call_timeout: default_call_timeout(),
        }
    }

    /// Resolve the API key, dereferencing a ${ENV_VAR} reference if present
    ///
    /// # Errors
    /// Returns a configuration error if the referenced variable is unset or
    /// the resolved key is empty
    pub fn resolve_api_key(&self) -> PitchResult<String> {
        let raw = self.api_key.trim();

        let resolved = if let Some(name) = raw
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            std::env::var(name).map_err(|_| {
                PitchError::configuration(format!(
                    "API key for provider '{}' references unset environment variable {name}",
                    self.id
                ))
            })?
        } else {
            raw.to_string()
        };

        if resolved.is_empty() {
            return Err(PitchError::configuration(format!(
                "API key for provider '{}' is empty",
                self.id
            )));
        }

        Ok(resolved)
    }

    /// Chain placement settings for this provider
    #[must_use]
    pub fn chain_config(&self) -> ProviderConfig {
        ProviderConfig {
            id: self.id.clone(),
            priority: self.priority,
            max_attempts: self.max_attempts,
            enabled: self.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.providers.is_empty());
        assert_eq!(config.rate_limit.max_requests, 10);
        assert!((config.retry.multiplier - 2.0).abs() < f64::EPSILON);
        config.validate_config().expect("defaults are valid");
    }

    #[test]
    fn test_server_socket_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_provider_settings_resolve_api_key() {
        std::env::set_var("PF_SCHEMA_TEST_KEY", "sk-resolved");

        let mut settings = ProviderSettings::new("openai-primary", 1);
        settings.api_key = "${PF_SCHEMA_TEST_KEY}".to_string();
        assert_eq!(settings.resolve_api_key().expect("resolve"), "sk-resolved");

        settings.api_key = "sk-literal".to_string();
        assert_eq!(settings.resolve_api_key().expect("resolve"), "sk-literal");

        std::env::remove_var("PF_SCHEMA_TEST_KEY");
    }

    #[test]
    fn test_resolve_api_key_rejects_unset_and_empty() {
        let mut settings = ProviderSettings::new("openai-primary", 1);

        settings.api_key = "${PF_SCHEMA_TEST_UNSET_KEY}".to_string();
        let error = settings.resolve_api_key().expect_err("unset variable");
        assert!(error.to_string().contains("PF_SCHEMA_TEST_UNSET_KEY"));

        settings.api_key = String::new();
        let error = settings.resolve_api_key().expect_err("empty key");
        assert!(error.to_string().contains("empty"));
    }

    #[test]
    fn test_duplicate_provider_ids_rejected() {
        let config = AppConfig {
            providers: vec![
                ProviderSettings::new("openai", 1),
                ProviderSettings::new("openai", 2),
            ],
            ..AppConfig::default()
        };

        let errors = config.validate_config().expect_err("duplicates");
        assert!(errors.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = AppConfig::default();
        config.retry.multiplier = 20.0;
        assert!(config.validate_config().is_err());

        let mut config = AppConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(config.validate_config().is_err());

        let mut config = AppConfig::default();
        config.monitoring.error_rate_threshold = 0.0;
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn test_chain_config_mirrors_settings() {
        let mut settings = ProviderSettings::new("backup", 2);
        settings.max_attempts = 1;
        settings.enabled = false;

        let chain = settings.chain_config();
        assert_eq!(chain.id, "backup");
        assert_eq!(chain.priority, 2);
        assert_eq!(chain.max_attempts, 1);
        assert!(!chain.enabled);
    }

    #[test]
    fn test_yaml_serialization() {
        let config = AppConfig::default();
        let yaml = serde_yaml::to_string(&config).expect("serialize");
        assert!(yaml.contains("server:"));
        assert!(yaml.contains("port: 8080"));
        assert!(yaml.contains("rate_limit:"));
    }
}
