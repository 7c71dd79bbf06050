//! # Upload Validation
//!
//! Checks an uploaded file before it reaches the orchestrator: filename and
//! extension, size, and a file signature of a supported image format.

use crate::config::WebConfig;
use crate::constants::signatures;
use crate::error::FeatureError;
use serde::Serialize;
use thiserror::Error;

/// Rejected upload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No image file provided")]
    MissingFile,

    #[error("Filename is required")]
    MissingFilename,

    #[error("File extension '{extension}' is not allowed")]
    ExtensionNotAllowed { extension: String },

    #[error("Image file is empty")]
    Empty,

    #[error("Image of {size_bytes} bytes exceeds the {max_bytes} byte limit")]
    TooLarge { size_bytes: usize, max_bytes: usize },

    #[error("File content is not a supported image format")]
    UnrecognizedFormat,
}

impl From<ValidationError> for FeatureError {
    fn from(err: ValidationError) -> Self {
        FeatureError::Validation(err.to_string())
    }
}

/// Image container detected from the leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl ImageFormat {
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(signatures::JPEG) {
            Some(Self::Jpeg)
        } else if data.starts_with(signatures::PNG) {
            Some(Self::Png)
        } else if data.starts_with(signatures::BMP) {
            Some(Self::Bmp)
        } else if data.starts_with(signatures::TIFF_LE) || data.starts_with(signatures::TIFF_BE) {
            Some(Self::Tiff)
        } else {
            None
        }
    }
}

/// Validate an uploaded image, returning its detected format
pub fn validate_upload(
    filename: Option<&str>,
    data: &[u8],
    config: &WebConfig,
) -> Result<ImageFormat, ValidationError> {
    let filename = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(ValidationError::MissingFilename)?;

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();
    if !config.is_extension_allowed(extension) {
        return Err(ValidationError::ExtensionNotAllowed {
            extension: extension.to_string(),
        });
    }

    let max_bytes = config.max_image_size_bytes();
    if data.len() > max_bytes {
        return Err(ValidationError::TooLarge {
            size_bytes: data.len(),
            max_bytes,
        });
    }

    if data.is_empty() {
        return Err(ValidationError::Empty);
    }

    ImageFormat::detect(data).ok_or(ValidationError::UnrecognizedFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> Vec<u8> {
        let mut data = signatures::PNG.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        data
    }

    #[test]
    fn test_accepts_supported_image() {
        let config = WebConfig::default();
        assert_eq!(
            validate_upload(Some("photo.PNG"), &png(), &config),
            Ok(ImageFormat::Png)
        );
    }

    #[test]
    fn test_rejects_missing_filename() {
        let config = WebConfig::default();
        assert_eq!(
            validate_upload(None, &png(), &config),
            Err(ValidationError::MissingFilename)
        );
        assert_eq!(
            validate_upload(Some("  "), &png(), &config),
            Err(ValidationError::MissingFilename)
        );
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let config = WebConfig::default();
        assert!(matches!(
            validate_upload(Some("notes.txt"), &png(), &config),
            Err(ValidationError::ExtensionNotAllowed { extension }) if extension == "txt"
        ));
        assert!(matches!(
            validate_upload(Some("noextension"), &png(), &config),
            Err(ValidationError::ExtensionNotAllowed { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let config = WebConfig {
            max_image_size_mb: 1,
            ..WebConfig::default()
        };
        assert_eq!(
            validate_upload(Some("a.jpg"), &[], &config),
            Err(ValidationError::Empty)
        );

        let big = vec![0xFFu8; 1024 * 1024 + 1];
        assert!(matches!(
            validate_upload(Some("a.jpg"), &big, &config),
            Err(ValidationError::TooLarge { max_bytes, .. }) if max_bytes == 1024 * 1024
        ));
    }

    #[test]
    fn test_rejects_unknown_signature() {
        let config = WebConfig::default();
        assert_eq!(
            validate_upload(Some("fake.jpg"), b"GIF89a....", &config),
            Err(ValidationError::UnrecognizedFormat)
        );
    }

    #[test]
    fn test_detects_each_format() {
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"BM\0\0"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::detect(&[0x49, 0x49, 0x2A, 0x00, 1]), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::detect(&[0x4D, 0x4D, 0x00, 0x2A]), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::detect(b"xx"), None);
    }
}
