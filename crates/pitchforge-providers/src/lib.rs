//! Pitch generation providers.
//!
//! Each provider turns a validated [`PitchRequest`](pitchforge_core::PitchRequest)
//! into a structured pitch by calling an external completion API. Providers are
//! paired with chain settings and handed to the fallback layer in priority order.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod openai;

// Re-export main types
pub use openai::{OpenAIConfig, OpenAIProvider};

use pitchforge_config::ProviderSettings;
use pitchforge_core::{PitchProvider, PitchResult, ProviderConfig};
use std::sync::Arc;
use tracing::info;

/// Build providers from configuration, paired with their chain settings
///
/// Disabled entries still get a provider instance so the chain can log them
/// as skipped, but their API keys are not required to resolve.
///
/// # Errors
/// Returns error if an enabled provider's API key cannot be resolved or its
/// HTTP client cannot be created
pub fn build_chain(
    settings: &[ProviderSettings],
) -> PitchResult<Vec<(ProviderConfig, Arc<dyn PitchProvider>)>> {
    let mut entries = Vec::with_capacity(settings.len());

    for provider_settings in settings {
        let api_key = if provider_settings.enabled {
            provider_settings.resolve_api_key()?
        } else {
            provider_settings.resolve_api_key().unwrap_or_default()
        };

        let config = OpenAIConfig::new(&provider_settings.id, api_key)
            .with_endpoint(&provider_settings.endpoint)
            .with_model(&provider_settings.model)
            .with_call_timeout(provider_settings.call_timeout);
        let provider = OpenAIProvider::new(config)?;

        info!(
            provider_id = %provider_settings.id,
            priority = provider_settings.priority,
            enabled = provider_settings.enabled,
            "Provider configured"
        );

        entries.push((
            provider_settings.chain_config(),
            Arc::new(provider) as Arc<dyn PitchProvider>,
        ));
    }

    Ok(entries)
}
