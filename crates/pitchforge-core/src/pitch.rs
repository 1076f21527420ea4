//! Validated domain types for pitch generation.
//!
//! User-supplied values use newtype wrappers validated at construction and
//! at deserialization, so a malformed request fails as a validation error
//! before any provider is consulted.

use crate::error::PitchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-submitted product idea (trimmed, non-empty, bounded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Idea(String);

impl Idea {
    /// Maximum length for an idea
    pub const MAX_LENGTH: usize = 500;

    /// Create a new idea with validation
    ///
    /// # Errors
    /// Returns `PitchError::Validation` if the trimmed value is empty or
    /// exceeds [`Idea::MAX_LENGTH`]
    pub fn new(value: impl Into<String>) -> Result<Self, PitchError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PitchError::validation_field("idea cannot be empty", "idea"));
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(PitchError::validation_field(
                format!("idea exceeds maximum length of {}", Self::MAX_LENGTH),
                "idea",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner value as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Idea {
    type Error = PitchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Idea> for String {
    fn from(idea: Idea) -> Self {
        idea.0
    }
}

impl fmt::Display for Idea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Idea {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The requested tone of voice (trimmed, non-empty, bounded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tone(String);

impl Tone {
    /// Maximum length for a tone
    pub const MAX_LENGTH: usize = 100;

    /// Create a new tone with validation
    ///
    /// # Errors
    /// Returns `PitchError::Validation` if the trimmed value is empty or
    /// exceeds [`Tone::MAX_LENGTH`]
    pub fn new(value: impl Into<String>) -> Result<Self, PitchError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PitchError::validation_field("tone cannot be empty", "tone"));
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(PitchError::validation_field(
                format!("tone exceeds maximum length of {}", Self::MAX_LENGTH),
                "tone",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner value as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tone {
    type Error = PitchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tone> for String {
    fn from(tone: Tone) -> Self {
        tone.0
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Tone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One generation request as seen by providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRequest {
    /// What the user wants pitched
    pub idea: Idea,
    /// How the pitch should sound
    pub tone: Tone,
}

/// The structured pitch document produced by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pitch {
    /// Product or venture name
    pub name: String,
    /// One-line tagline
    pub tagline: String,
    /// Short elevator pitch paragraph
    pub elevator_pitch: String,
    /// Who the pitch addresses
    pub target_audience: String,
    /// Headline features, in presentation order
    #[serde(default)]
    pub key_features: Vec<String>,
}

/// Successful response body for the generation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// The generated pitch
    pub pitch: Pitch,
    /// Provider that served the request
    pub provider: String,
    /// Correlation id echoed back to the client
    pub request_id: String,
    /// Attempts consumed across the provider chain
    pub attempts: u32,
    /// Wall-clock time spent generating, in milliseconds
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idea_valid() {
        assert!(Idea::new("Uber for dogs").is_ok());
        assert!(Idea::new("  padded  ").is_ok());
    }

    #[test]
    fn test_idea_trims_whitespace() {
        let idea = Idea::new("  Uber for dogs  ").expect("valid idea");
        assert_eq!(idea.as_str(), "Uber for dogs");
    }

    #[test]
    fn test_idea_invalid() {
        assert!(Idea::new("").is_err());
        assert!(Idea::new("   ").is_err());
        assert!(Idea::new("a".repeat(501)).is_err());
    }

    #[test]
    fn test_tone_invalid() {
        assert!(Tone::new("").is_err());
        assert!(Tone::new("t".repeat(101)).is_err());
    }

    #[test]
    fn test_validation_errors_name_the_field() {
        match Idea::new("") {
            Err(PitchError::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("idea"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_request_deserializes_and_validates() {
        let request: PitchRequest =
            serde_json::from_str(r#"{"idea": "Uber for dogs", "tone": "fun"}"#)
                .expect("valid request");
        assert_eq!(request.idea.as_str(), "Uber for dogs");
        assert_eq!(request.tone.as_str(), "fun");

        let empty: Result<PitchRequest, _> = serde_json::from_str(r#"{"idea": "", "tone": "fun"}"#);
        assert!(empty.is_err());
    }

    #[test]
    fn test_pitch_wire_format_is_camel_case() {
        let pitch = Pitch {
            name: "PawRide".to_string(),
            tagline: "Walkies on demand".to_string(),
            elevator_pitch: "The easiest way to get your dog anywhere.".to_string(),
            target_audience: "Busy dog owners".to_string(),
            key_features: vec!["Live GPS".to_string()],
        };
        let json = serde_json::to_value(&pitch).expect("serialize");
        assert!(json.get("elevatorPitch").is_some());
        assert!(json.get("targetAudience").is_some());
        assert!(json.get("keyFeatures").is_some());
    }
}
