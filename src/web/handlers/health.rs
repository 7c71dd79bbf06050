//! # Health Check Handlers
//!
//! Kubernetes-compatible health endpoints plus the orchestrator metrics
//! snapshot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use crate::constants::{SERVICE_NAME, SERVICE_VERSION};
use crate::executor::ExecutorMetrics;
use crate::resilience::CircuitBreakerMetrics;
use crate::orchestrator::OrchestratorSnapshot;
use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub extractor_ready: bool,
    pub cache_connected: bool,
    pub cache_provider: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// Probe response
#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Metrics response
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub orchestrator: OrchestratorSnapshot,
    pub executor: ExecutorMetrics,
    /// Present when the cache backend is guarded by a circuit breaker
    pub cache_circuit_breaker: Option<CircuitBreakerMetrics>,
    pub uptime_seconds: u64,
}

/// Service health: GET /health
///
/// Always answers 200; `degraded` when an enabled cache is unreachable.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.orchestrator.cache();
    let cache_enabled = cache.is_enabled();
    let cache_connected = cache_enabled && cache.health_check().await;
    debug!(
        cache_enabled = cache_enabled,
        cache_connected = cache_connected,
        "Health check"
    );

    Json(HealthResponse {
        status: if cache_connected || !cache_enabled {
            "healthy"
        } else {
            "degraded"
        },
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        extractor_ready: state.extractor_ready(),
        cache_connected,
        cache_provider: cache.provider_name(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Kubernetes liveness probe: GET /health/live
pub async fn liveness_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse {
        status: "alive",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Kubernetes readiness probe: GET /health/ready
///
/// 503 until the extractor is warm, and while the executor is saturated.
pub async fn readiness_probe(
    State(state): State<AppState>,
) -> Result<Json<ProbeResponse>, ApiError> {
    if state.is_ready() {
        Ok(Json(ProbeResponse {
            status: "ready",
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
    } else {
        Err(ApiError::NotReady)
    }
}

/// Counters snapshot: GET /metrics
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, Json<MetricsResponse>) {
    (
        StatusCode::OK,
        Json(MetricsResponse {
            orchestrator: state.orchestrator.snapshot(),
            executor: state.orchestrator.executor().metrics(),
            cache_circuit_breaker: state.orchestrator.cache().circuit_metrics(),
            uptime_seconds: state.uptime_seconds(),
        }),
    )
}
