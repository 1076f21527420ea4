//! # Pitchforge Server
//!
//! HTTP surface for the pitch generation service: request handlers,
//! middleware, shared application state, and the server lifecycle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse};
pub use handlers::{GenerateBody, HealthResponse, ProviderStatus, RateLimitInfo};
pub use routes::create_router;
pub use server::{Server, ServerError};
pub use state::{AppState, AppStateBuilder};
