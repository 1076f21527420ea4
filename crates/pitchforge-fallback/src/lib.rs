//! # Pitchforge Fallback
//!
//! Priority-ordered provider fallback for the pitch generation service.
//! Each provider gets a per-provider retry budget; the chain advances on
//! exhaustion and short-circuits on cancellation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;

// Re-export main types
pub use chain::{ChainEntry, FallbackChain, GenerationOutcome};
