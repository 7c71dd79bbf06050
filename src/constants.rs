//! # Service Constants
//!
//! Key prefixes and defaults shared across modules.

/// Prefix applied to every fingerprint-derived cache key
pub const CACHE_KEY_PREFIX: &str = "features:";

/// Pattern matching every key this service writes
pub const CACHE_KEY_PATTERN: &str = "features:*";

/// Version tag stored with each serialized cache entry
pub const CACHE_ENTRY_FORMAT_VERSION: u32 = 1;

/// Service name reported by health and root endpoints
pub const SERVICE_NAME: &str = "feature-cache";

/// Crate version reported by health and root endpoints
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds a client is asked to wait after an overload rejection
pub const OVERLOAD_RETRY_AFTER_SECONDS: u64 = 1;

/// Header carrying the request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the server-side processing time
pub const PROCESSING_TIME_HEADER: &str = "x-processing-time-ms";

/// Supported image file signatures
pub mod signatures {
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    pub const BMP: &[u8] = b"BM";
    pub const TIFF_LE: &[u8] = &[0x49, 0x49, 0x2A, 0x00];
    pub const TIFF_BE: &[u8] = &[0x4D, 0x4D, 0x00, 0x2A];
}
