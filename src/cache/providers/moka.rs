//! In-memory cache provider using Moka
//!
//! In-process caching with a cache-wide TTL and size-bounded eviction.
//! State is not shared between processes.

use crate::cache::errors::CacheResult;
use crate::cache::traits::{matches_pattern, BackendStats, CacheService};
use crate::config::MokaConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// In-memory cache service using Moka
///
/// All entries share the TTL configured at construction time.
#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, Arc<str>>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MokaCacheService {
    pub fn from_config(config: &MokaConfig, default_ttl: Duration) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(default_ttl)
            .build();

        debug!(
            max_capacity = config.max_capacity,
            ttl_seconds = default_ttl.as_secs(),
            "Moka in-memory cache service created"
        );

        Self { cache, default_ttl }
    }

    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        Self::from_config(&MokaConfig { max_capacity }, default_ttl)
    }
}

impl CacheService for MokaCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let result = self.cache.get(key).await.map(|value| value.to_string());

        if result.is_some() {
            debug!(key = key, "Cache HIT (moka)");
        } else {
            debug!(key = key, "Cache MISS (moka)");
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
        // TTL is cache-wide, fixed at construction
        self.cache.insert(key.to_string(), Arc::from(value)).await;

        debug!(
            key = key,
            ttl_seconds = self.default_ttl.as_secs(),
            "Cache SET (moka)"
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let removed = self.cache.remove(key).await.is_some();
        debug!(key = key, removed = removed, "Cache DEL (moka)");
        Ok(removed)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let keys: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| matches_pattern(pattern, key))
            .map(|(key, _)| key)
            .collect();

        let mut deleted = 0;
        for key in keys {
            if self.cache.remove(key.as_str()).await.is_some() {
                deleted += 1;
            }
        }

        debug!(pattern = pattern, deleted = deleted, "Cache pattern DEL (moka)");
        Ok(deleted)
    }

    async fn backend_stats(&self) -> CacheResult<BackendStats> {
        self.cache.run_pending_tasks().await;

        let memory_bytes: u64 = self
            .cache
            .iter()
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum();

        Ok(BackendStats {
            key_count: Some(self.cache.entry_count()),
            memory_bytes: Some(memory_bytes),
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}
