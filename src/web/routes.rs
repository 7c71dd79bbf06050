//! # Web API Route Definitions
//!
//! Detection and cache administration live under `/api/v1`; health, metrics
//! and service info sit at the root.

use crate::web::handlers;
use crate::web::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/features/detect",
            post(handlers::features::detect_features),
        )
        .route("/cache/stats", get(handlers::cache::cache_stats))
        .route(
            "/cache/stats/reset",
            post(handlers::cache::reset_cache_stats),
        )
        .route("/cache", delete(handlers::cache::flush_cache))
        .route("/cache/:fingerprint", delete(handlers::cache::delete_entry))
}

/// Create health and metrics routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root::service_info))
        .route("/health", get(handlers::health::health))
        .route("/health/live", get(handlers::health::liveness_probe))
        .route("/health/ready", get(handlers::health::readiness_probe))
        .route("/metrics", get(handlers::health::metrics))
}
