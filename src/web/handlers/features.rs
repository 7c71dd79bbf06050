//! # Feature Detection Handler
//!
//! `POST /api/v1/features/detect` with a multipart `image` field.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

use crate::web::errors::{ApiError, ApiResult};
use crate::web::middleware::request_id::RequestId;
use crate::web::state::AppState;
use crate::web::validation::{validate_upload, ValidationError};

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Successful detection response
#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub keypoints: usize,
    pub descriptors_shape: [usize; 2],
    pub cached: bool,
    pub processing_time_ms: f64,
    pub request_id: String,
    pub fingerprint: String,
}

/// Detect features: POST /api/v1/features/detect
pub async fn detect_features(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    multipart: Multipart,
) -> ApiResult<Json<DetectionResponse>> {
    let request_id = request_id.as_str();
    let max_bytes = state.config.web.max_image_size_bytes();

    let (filename, data) = read_image_field(multipart, max_bytes)
        .await
        .map_err(|e| e.with_request_id(request_id))?;

    let format = validate_upload(filename.as_deref(), &data, &state.config.web)
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;
    debug!(
        request_id = %request_id,
        format = ?format,
        size_bytes = data.len(),
        "Upload accepted"
    );

    let detection = state
        .orchestrator
        .handle(data, request_id)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;

    info!(
        request_id = %request_id,
        fingerprint = %detection.fingerprint.short(),
        cache_status = %detection.cache_status,
        keypoints = detection.features.feature_count,
        "Features detected"
    );

    Ok(Json(DetectionResponse {
        success: true,
        keypoints: detection.features.feature_count,
        descriptors_shape: detection.features.descriptors_shape(),
        cached: detection.cache_status.is_hit(),
        processing_time_ms: detection.elapsed.as_secs_f64() * 1000.0,
        request_id: request_id.to_string(),
        fingerprint: detection.fingerprint.to_hex(),
    }))
}

/// Pull the `image` field out of the form, skipping anything else
async fn read_image_field(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(Option<String>, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;
        return Ok((filename, data));
    }
    Err(ValidationError::MissingFile.into())
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::from(ValidationError::TooLarge {
            size_bytes: max_bytes.saturating_add(1),
            max_bytes,
        })
    } else {
        ApiError::invalid_image(err.body_text())
    }
}
