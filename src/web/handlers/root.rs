//! # Service Info Handler

use axum::Json;
use serde_json::{json, Value};

use crate::constants::{SERVICE_NAME, SERVICE_VERSION};

/// Service info and links: GET /
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "endpoints": {
            "detect": "/api/v1/features/detect",
            "health": "/health",
            "liveness": "/health/live",
            "readiness": "/health/ready",
            "metrics": "/metrics",
            "cache_stats": "/api/v1/cache/stats",
        }
    }))
}
