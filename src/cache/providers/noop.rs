//! No-op cache provider
//!
//! Always misses, always succeeds. Used when caching is disabled or the
//! configured backend cannot be constructed.

use crate::cache::errors::CacheResult;
use crate::cache::traits::{BackendStats, CacheService};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        Ok(0)
    }

    async fn backend_stats(&self) -> CacheResult<BackendStats> {
        Ok(BackendStats {
            key_count: Some(0),
            memory_bytes: Some(0),
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_never_stores() {
        let svc = NoOpCacheService::new();
        svc.set("features:x", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(svc.get("features:x").await.unwrap(), None);
        assert!(!svc.delete("features:x").await.unwrap());
    }

    #[tokio::test]
    async fn test_noop_reports_empty_and_healthy() {
        let svc = NoOpCacheService::new();
        assert!(svc.health_check().await.unwrap());
        assert_eq!(svc.backend_stats().await.unwrap().key_count, Some(0));
        assert!(!svc.is_enabled());
    }
}
