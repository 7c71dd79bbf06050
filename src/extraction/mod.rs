//! # Feature Extraction
//!
//! The CPU-bound extraction strategy and the result type that flows through
//! the cache. Extractors are synchronous and deterministic; the executor is
//! responsible for running them off the async runtime.

pub mod luma;

pub use luma::LumaGridExtractor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by an extraction strategy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The payload cannot be interpreted as an image
    #[error("Unreadable image payload: {0}")]
    InvalidInput(String),

    /// The strategy produced a malformed result
    #[error("Invalid extractor output: {0}")]
    InvalidOutput(String),

    /// Any other strategy failure
    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// Extracted features: a count plus a flat descriptor matrix
///
/// `descriptors` holds `feature_count` rows of `descriptor_dim` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub feature_count: usize,
    pub descriptor_dim: usize,
    pub descriptors: Vec<u8>,
}

impl FeatureSet {
    /// Build a feature set, checking the descriptor buffer against its shape
    pub fn new(
        feature_count: usize,
        descriptor_dim: usize,
        descriptors: Vec<u8>,
    ) -> Result<Self, ExtractionError> {
        let set = Self {
            feature_count,
            descriptor_dim,
            descriptors,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn empty(descriptor_dim: usize) -> Self {
        Self {
            feature_count: 0,
            descriptor_dim,
            descriptors: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.descriptor_dim == 0 && self.feature_count > 0 {
            return Err(ExtractionError::InvalidOutput(format!(
                "{} features with zero descriptor dimension",
                self.feature_count
            )));
        }

        let expected = self.feature_count.checked_mul(self.descriptor_dim).ok_or_else(|| {
            ExtractionError::InvalidOutput("descriptor shape overflows".to_string())
        })?;

        if self.descriptors.len() != expected {
            return Err(ExtractionError::InvalidOutput(format!(
                "descriptor buffer has {} bytes, expected {} ({} x {})",
                self.descriptors.len(),
                expected,
                self.feature_count,
                self.descriptor_dim
            )));
        }

        Ok(())
    }

    /// `[rows, columns]` of the descriptor matrix
    pub fn descriptors_shape(&self) -> [usize; 2] {
        [self.feature_count, self.descriptor_dim]
    }
}

/// A synchronous, deterministic, CPU-bound feature extraction strategy
pub trait FeatureExtractor: Send + Sync + 'static {
    /// Short strategy name for logs and health output
    fn name(&self) -> &'static str;

    /// Extract features from raw image bytes
    fn extract(&self, payload: &[u8]) -> Result<FeatureSet, ExtractionError>;

    /// Run once at startup so the first request does not pay initialization costs
    fn warm_up(&self) -> Result<(), ExtractionError> {
        let sample: Vec<u8> = (0..64u32 * 64)
            .map(|i| ((i % 64) * 4 ^ (i / 64) * 3) as u8)
            .collect();
        self.extract(&sample).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        assert!(FeatureSet::new(2, 4, vec![0; 8]).is_ok());
        assert!(matches!(
            FeatureSet::new(2, 4, vec![0; 7]),
            Err(ExtractionError::InvalidOutput(_))
        ));
        assert!(FeatureSet::new(3, 0, vec![]).is_err());
        assert!(FeatureSet::new(0, 0, vec![]).is_ok());
    }

    #[test]
    fn test_descriptors_shape() {
        let set = FeatureSet::new(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(set.descriptors_shape(), [2, 3]);
    }

    #[test]
    fn test_serde_keeps_shape() {
        let set = FeatureSet::new(1, 2, vec![9, 8]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: FeatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
