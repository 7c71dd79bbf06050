//! # Web API Error Types
//!
//! HTTP error classification for the detection API. Every error renders as
//! `{success: false, error_code, message, details, request_id}`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::cache::CacheError;
use crate::constants::OVERLOAD_RETRY_AFTER_SECONDS;
use crate::error::FeatureError;
use crate::web::validation::ValidationError;

/// Web API errors with HTTP status code mappings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid image: {message}")]
    InvalidImage { message: String },

    #[error("Image of {size_bytes} bytes exceeds the {max_bytes} byte limit")]
    ImageTooLarge { size_bytes: usize, max_bytes: usize },

    #[error("Feature detection failed: {reason}")]
    ComputeFailure { reason: String },

    #[error("Service overloaded, retry later")]
    Overloaded { running: usize, queued: usize },

    #[error("Request timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("Invalid fingerprint: {value}")]
    InvalidFingerprint { value: String },

    #[error("Cache unavailable: {reason}")]
    CacheUnavailable { reason: String },

    #[error("Service not ready")]
    NotReady,

    #[error("Internal server error")]
    Internal { message: String },
}

impl ApiError {
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    pub fn invalid_fingerprint(value: impl Into<String>) -> Self {
        Self::InvalidFingerprint {
            value: value.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidImage { .. } | Self::InvalidFingerprint { .. } => StatusCode::BAD_REQUEST,
            Self::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ComputeFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Overloaded { .. } | Self::CacheUnavailable { .. } | Self::NotReady => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidImage { .. } => "INVALID_IMAGE",
            Self::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            Self::ComputeFailure { .. } => "COMPUTE_FAILURE",
            Self::Overloaded { .. } => "SERVICE_OVERLOADED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidFingerprint { .. } => "INVALID_FINGERPRINT",
            Self::CacheUnavailable { .. } => "CACHE_UNAVAILABLE",
            Self::NotReady => "SERVICE_NOT_READY",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::ImageTooLarge {
                size_bytes,
                max_bytes,
            } => Some(json!({ "size_bytes": size_bytes, "max_bytes": max_bytes })),
            Self::Overloaded { running, queued } => Some(json!({
                "running": running,
                "queued": queued,
                "retry_after_seconds": OVERLOAD_RETRY_AFTER_SECONDS,
            })),
            Self::Timeout { waited_ms } => Some(json!({ "waited_ms": waited_ms })),
            _ => None,
        }
    }

    /// Attach the request id that will be echoed in the body
    pub fn with_request_id(self, request_id: impl Into<String>) -> ErrorResponse {
        ErrorResponse {
            error: self,
            request_id: Some(request_id.into()),
        }
    }
}

/// Serialized error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error_code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub request_id: Option<String>,
}

/// An [`ApiError`] bound to the request it answers
#[derive(Debug)]
pub struct ErrorResponse {
    pub error: ApiError,
    pub request_id: Option<String>,
}

impl From<ApiError> for ErrorResponse {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let message = match &self.error {
            // internal detail stays in the logs
            ApiError::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            success: false,
            error_code: self.error.error_code(),
            message,
            details: self.error.details(),
            request_id: self.request_id,
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self.error, ApiError::Overloaded { .. }) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(OVERLOAD_RETRY_AFTER_SECONDS),
            );
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

impl From<FeatureError> for ApiError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::Validation(message) => Self::InvalidImage { message },
            FeatureError::CacheUnavailable(reason) => Self::CacheUnavailable { reason },
            FeatureError::ComputeFailure { reason } => Self::ComputeFailure { reason },
            FeatureError::Overloaded { running, queued } => Self::Overloaded { running, queued },
            FeatureError::Timeout { waited_ms } => Self::Timeout { waited_ms },
            other @ (FeatureError::Cancelled | FeatureError::Configuration(_)) => {
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self::CacheUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TooLarge {
                size_bytes,
                max_bytes,
            } => Self::ImageTooLarge {
                size_bytes,
                max_bytes,
            },
            other => Self::invalid_image(other.to_string()),
        }
    }
}

/// Result type alias for web API operations
pub type ApiResult<T> = Result<T, ErrorResponse>;
