//! # Web API Module
//!
//! Axum-based HTTP surface for feature detection.
//!
//! - [`routes`] - HTTP route definitions
//! - [`handlers`] - detection, health and cache administration handlers
//! - [`middleware`] - request ids, timeout, CORS, tracing, body limit
//! - [`validation`] - upload checks run before a payload reaches the core
//! - [`errors`] - HTTP error classification and bodies
//! - [`state`] - shared application state

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod validation;

use axum::Router;
use state::AppState;

/// Create the main Axum application with all routes and middleware
pub fn create_app(app_state: AppState) -> Router {
    let router = Router::new()
        .merge(routes::health_routes())
        .nest("/api/v1", routes::api_v1_routes());

    middleware::apply_middleware_stack(router, &app_state.config.web).with_state(app_state)
}
