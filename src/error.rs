//! # Error Types
//!
//! Error taxonomy for the cache-and-compute core. `FeatureError` is `Clone` so
//! that one flight outcome can be handed to every waiter of a fingerprint.

use thiserror::Error;

/// Errors surfaced by the orchestrator and its components
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// Malformed or unsupported input, raised by the upload layer only
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cache backend unreachable; recovered locally and never returned by `handle`
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The extraction function failed, panicked, produced invalid output or overran
    #[error("Feature computation failed: {reason}")]
    ComputeFailure { reason: String },

    /// The executor has no free worker and no free queue slot
    #[error("Compute executor overloaded: {running} running, {queued} queued")]
    Overloaded { running: usize, queued: usize },

    /// The caller's deadline elapsed before a result was available
    #[error("Request timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// A queued submission was abandoned before it started
    #[error("Computation cancelled before it started")]
    Cancelled,

    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FeatureError {
    pub fn compute_failure(reason: impl Into<String>) -> Self {
        Self::ComputeFailure {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable classification code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_IMAGE",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            Self::ComputeFailure { .. } => "COMPUTE_FAILURE",
            Self::Overloaded { .. } => "SERVICE_OVERLOADED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether a client retrying the same request later could succeed
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::CacheUnavailable(_) | Self::Overloaded { .. } | Self::Timeout { .. }
        )
    }
}

impl From<crate::config::ConfigurationError> for FeatureError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type FeatureResult<T> = Result<T, FeatureError>;
