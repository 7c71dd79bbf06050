//! # Web API Middleware
//!
//! Layers shared by every route: request ids, timeout, CORS, tracing and the
//! request body limit.

pub mod request_id;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::web::state::AppState;

/// Room for multipart boundaries and headers around the image itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Apply the middleware stack for a router with app state
///
/// Order, outermost first:
/// 1. Request ID and processing time
/// 2. Request tracing
/// 3. CORS handling
/// 4. Request timeout
/// 5. Body size limit
pub fn apply_middleware_stack(router: Router<AppState>, config: &WebConfig) -> Router<AppState> {
    let body_limit = config.max_image_size_bytes() + MULTIPART_OVERHEAD_BYTES;

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::add_request_id))
}

/// Create CORS layer with appropriate settings
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
