//! Route definitions for the pitch API.

use crate::{handlers, middleware as mw, state::AppState};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate_pitch))
        .route("/health", get(handlers::health_check))
        .route("/providers", get(handlers::list_providers))
        .layer(from_fn(mw::logging_middleware))
        .layer(from_fn(mw::request_id_middleware))
        .layer(from_fn(mw::response_time_middleware))
        .layer(mw::cors_layer())
        .with_state(state)
}
