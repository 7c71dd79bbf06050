//! # Cache Administration Handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::cache::CacheStats;
use crate::fingerprint::Fingerprint;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub fingerprint: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct FlushResponse {
    pub success: bool,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
}

/// Cache statistics: GET /api/v1/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<CacheStatsResponse>> {
    let cache = state.orchestrator.cache();
    let stats = cache.stats().await.map_err(ApiError::from)?;
    Ok(Json(CacheStatsResponse {
        success: true,
        enabled: cache.is_enabled(),
        hit_rate: stats.hit_rate(),
        stats,
    }))
}

/// Zero hit/miss counters: POST /api/v1/cache/stats/reset
pub async fn reset_cache_stats(State(state): State<AppState>) -> Json<ResetResponse> {
    state.orchestrator.cache().reset_stats();
    info!("Cache statistics reset");
    Json(ResetResponse { success: true })
}

/// Evict one entry: DELETE /api/v1/cache/:fingerprint
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let fp = Fingerprint::from_hex(&fingerprint)
        .ok_or_else(|| ApiError::invalid_fingerprint(fingerprint.clone()))?;
    let deleted = state
        .orchestrator
        .cache()
        .delete(&fp)
        .await
        .map_err(ApiError::from)?;
    info!(fingerprint = %fp.short(), deleted = deleted, "Cache entry evicted");

    Ok(Json(DeleteResponse {
        success: true,
        fingerprint: fp.to_hex(),
        deleted,
    }))
}

/// Evict every entry: DELETE /api/v1/cache
pub async fn flush_cache(State(state): State<AppState>) -> ApiResult<Json<FlushResponse>> {
    let deleted = state
        .orchestrator
        .cache()
        .flush_all()
        .await
        .map_err(ApiError::from)?;
    info!(deleted = deleted, "Feature cache flushed");
    Ok(Json(FlushResponse {
        success: true,
        deleted,
    }))
}
