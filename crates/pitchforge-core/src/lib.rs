//! # Pitchforge Core
//!
//! Shared domain types for the pitch generation service:
//! - Error taxonomy with failure classification and retryability
//! - Validated request types and the pitch document model
//! - The provider contract and attempt observation hooks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod pitch;
pub mod provider;

// Re-export main types
pub use error::{ErrorKind, PitchError, PitchResult};
pub use pitch::{GenerateResponse, Idea, Pitch, PitchRequest, Tone};
pub use provider::{
    AttemptObserver, AttemptOutcome, AttemptRecord, NullObserver, PitchProvider, ProviderConfig,
    DEFAULT_CALL_TIMEOUT,
};
