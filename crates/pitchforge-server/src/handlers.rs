//! HTTP request handlers for the pitch API.

use axum::{extract::State, Json};
use pitchforge_core::{GenerateResponse, Idea, PitchError, PitchRequest, Tone};
use pitchforge_monitor::{HealthReport, MonitorEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApiError,
    extractors::{ClientKey, JsonBody, RequestId},
    state::AppState,
};

/// Monitor key tracking the end-to-end generation flow
pub const GENERATE_KEY: &str = "generate";

/// Generation request body
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Product idea to pitch
    pub idea: String,
    /// Desired tone of voice
    pub tone: String,
}

/// Generate a pitch for the submitted idea
#[instrument(skip(state, body), fields(request_id = %request_id, client = %client_key))]
pub async fn generate_pitch(
    State(state): State<AppState>,
    ClientKey(client_key): ClientKey,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<GenerateBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    // Admission control comes before validation; rejected requests must not
    // consume backend budget or skew usage metrics
    let decision = state.limiter.check(&client_key);
    if !decision.allowed {
        let retry_after_secs = decision.retry_after_secs.unwrap_or(1);
        warn!(
            client = %client_key,
            retry_after_secs,
            "Rate limit exceeded"
        );
        return Err(PitchError::RateLimited {
            retry_after_secs,
            limit: state.config.rate_limit.max_requests,
        }
        .into());
    }

    state.monitor.record(GENERATE_KEY, MonitorEvent::Usage);

    let request = PitchRequest {
        idea: Idea::new(body.idea)?,
        tone: Tone::new(body.tone)?,
    };

    debug!(request_id = %request_id, "Processing pitch generation request");

    match state.chain.generate(&request, &state.shutdown).await {
        Ok(outcome) => {
            state.monitor.record(GENERATE_KEY, MonitorEvent::Success);
            state.monitor.record(
                GENERATE_KEY,
                MonitorEvent::Performance {
                    latency_ms: outcome.elapsed_ms as f64,
                },
            );

            info!(
                request_id = %request_id,
                provider = %outcome.provider_id,
                attempts = outcome.attempts,
                elapsed_ms = outcome.elapsed_ms,
                "Pitch generated"
            );

            Ok(Json(GenerateResponse {
                pitch: outcome.pitch,
                provider: outcome.provider_id,
                request_id,
                attempts: outcome.attempts,
                elapsed_ms: outcome.elapsed_ms,
            }))
        }
        Err(e) => {
            state.monitor.record(
                GENERATE_KEY,
                MonitorEvent::Error {
                    message: e.to_string(),
                },
            );

            warn!(
                request_id = %request_id,
                error = %e,
                "Pitch generation failed"
            );

            Err(e.into())
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Error counts, recent error log, and retry statistics
    pub errors: HealthReport,
    /// Active rate limit settings
    pub rate_limit: RateLimitInfo,
}

/// Active rate limiter settings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Requests admitted per window
    pub max_requests: u32,
    /// Whether limiting is enforced
    pub enabled: bool,
    /// Number of client keys currently tracked
    pub tracked_keys: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.chain.has_enabled_provider() {
        "ok"
    } else {
        "degraded"
    };

    let rate_config = &state.config.rate_limit;

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        errors: state.monitor.health_report(),
        rate_limit: RateLimitInfo {
            window_ms: rate_config.window.as_millis() as u64,
            max_requests: rate_config.max_requests,
            enabled: rate_config.enabled,
            tracked_keys: state.limiter.key_count(),
        },
    })
}

/// Provider chain entry as reported by the introspection endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Provider ID
    pub id: String,
    /// Chain position (lower = tried first)
    pub priority: u32,
    /// Attempt budget per request
    pub max_attempts: u32,
    /// Whether the provider participates in the chain
    pub enabled: bool,
}

/// List the configured provider chain
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderStatus>> {
    let statuses = state
        .chain
        .entries()
        .iter()
        .map(|entry| ProviderStatus {
            id: entry.config.id.clone(),
            priority: entry.config.priority,
            max_attempts: entry.config.max_attempts,
            enabled: entry.config.enabled,
        })
        .collect();

    Json(statuses)
}
