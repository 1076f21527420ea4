//! OpenAI-compatible pitch provider.
//!
//! Talks to any chat-completions endpoint that speaks the OpenAI wire
//! format. The model is asked for a strict JSON pitch document; responses
//! are classified into the shared failure taxonomy so the retry and
//! fallback layers can act on them.

use async_trait::async_trait;
use pitchforge_core::{ErrorKind, Pitch, PitchError, PitchProvider, PitchRequest, PitchResult};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

const SYSTEM_PROMPT: &str = "You are a startup pitch writer. Reply with a single JSON object \
    containing the keys \"name\", \"tagline\", \"elevatorPitch\", \"targetAudience\", and \
    \"keyFeatures\" (an array of strings). Do not include any other text.";

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Provider instance ID
    pub id: String,
    /// API key
    pub api_key: SecretString,
    /// API base (default: https://api.openai.com/v1)
    pub endpoint: String,
    /// Model to request
    pub model: String,
    /// Per-call deadline
    pub call_timeout: Duration,
}

impl OpenAIConfig {
    /// Create a new OpenAI configuration
    #[must_use]
    pub fn new(id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_key: SecretString::new(api_key.into()),
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            call_timeout: Duration::from_secs(45),
        }
    }

    /// Set the API base
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-call deadline
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: OpenAIConfig) -> PitchResult<Self> {
        let client = Client::builder()
            .timeout(config.call_timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| PitchError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Get the chat completions endpoint URL
    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn build_request(&self, request: &PitchRequest) -> CompletionRequest<'_> {
        CompletionRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: format!(
                        "Write a {} pitch for this product idea: {}",
                        request.tone, request.idea
                    ),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }

    fn transport_error(&self, error: &reqwest::Error) -> PitchError {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Network
        };
        PitchError::backend(&self.config.id, kind, format!("request failed: {error}"))
    }

    /// A body that does not match the completions schema means the endpoint
    /// is not speaking this API, so the same provider is not retried.
    fn envelope_error(&self, error: impl std::fmt::Display) -> PitchError {
        PitchError::backend_override(
            &self.config.id,
            ErrorKind::BackendService,
            format!("failed to parse response envelope: {error}"),
            false,
        )
    }

    /// Extract the pitch document from model output
    ///
    /// Models occasionally wrap the JSON in prose or a code fence, so this
    /// parses the outermost brace-delimited slice.
    fn parse_pitch(&self, content: &str) -> PitchResult<Pitch> {
        let json_slice = match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if end >= start => &content[start..=end],
            _ => content,
        };
        serde_json::from_str(json_slice).map_err(|e| {
            PitchError::backend(
                &self.config.id,
                ErrorKind::BackendService,
                format!("model returned malformed pitch JSON: {e}"),
            )
        })
    }
}

#[async_trait]
impl PitchProvider for OpenAIProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn call_timeout(&self) -> Duration {
        self.config.call_timeout
    }

    #[instrument(skip(self, request), fields(provider = %self.config.id))]
    async fn generate(&self, request: &PitchRequest) -> PitchResult<Pitch> {
        let body = self.build_request(request);

        debug!(
            provider = %self.config.id,
            model = %self.config.model,
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let kind = classify_status(status.as_u16());

            error!(
                provider = %self.config.id,
                status = %status,
                error = %error_body,
                "Completion request rejected"
            );

            return Err(PitchError::backend_with_status(
                &self.config.id,
                kind,
                error_body,
                status.as_u16(),
            ));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| self.envelope_error(e))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PitchError::backend(
                    &self.config.id,
                    ErrorKind::BackendService,
                    "response contained no content",
                )
            })?;

        self.parse_pitch(&content)
    }
}

/// Map an HTTP status from the backend to a failure kind
fn classify_status(status: u16) -> ErrorKind {
    match status {
        408 => ErrorKind::Timeout,
        429 => ErrorKind::BackendService,
        500..=599 => ErrorKind::Server,
        400..=499 => ErrorKind::Validation,
        _ => ErrorKind::Unknown,
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
