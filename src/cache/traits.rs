//! Cache service trait definition

use super::errors::CacheResult;
use serde::Serialize;
use std::time::Duration;

/// Backend-reported size information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    /// Number of keys held by the backend, when it can tell
    pub key_count: Option<u64>,
    /// Approximate memory used by the backend in bytes, when it can tell
    pub memory_bytes: Option<u64>,
}

/// Trait defining raw key-value cache operations
///
/// Implemented by concrete cache providers (Redis, Moka, NoOp).
/// All operations are async and return `CacheResult` for error handling.
pub trait CacheService: Send + Sync {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Set a value in the cache with a TTL
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a specific key, returning whether it existed
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Delete all keys matching a glob pattern without blocking the backend
    fn delete_pattern(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = CacheResult<u64>> + Send;

    /// Key count and memory usage
    fn backend_stats(&self) -> impl std::future::Future<Output = CacheResult<BackendStats>> + Send;

    /// Check if the cache backend is healthy
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;

    /// Whether operations cross the network (and warrant circuit breaker protection)
    fn is_distributed(&self) -> bool {
        false
    }

    /// Whether the backend actually stores anything
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Match `key` against a glob with a single trailing `*`, or an exact key
pub(crate) fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}
