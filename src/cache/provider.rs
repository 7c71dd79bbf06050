//! Cache provider selected from configuration
//!
//! Uses enum dispatch over the concrete backends. Construction never fails:
//! an unusable configuration degrades to the no-op backend, and an
//! unreachable Redis server keeps the Redis backend so it can come back
//! without a restart.

use super::errors::CacheResult;
use super::providers::{MokaCacheService, NoOpCacheService, RedisCacheService};
use super::traits::{BackendStats, CacheService};
use crate::config::CacheConfig;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
enum CacheBackend {
    Redis(Box<RedisCacheService>),
    Moka(Box<MokaCacheService>),
    NoOp(NoOpCacheService),
}

/// Configured cache backend
#[derive(Debug, Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
}

impl CacheProvider {
    /// Create a provider from configuration with graceful degradation
    ///
    /// For Redis one bounded connection attempt is made up front; failure is
    /// logged and later operations try again.
    pub async fn from_config_graceful(config: &CacheConfig) -> Self {
        let backend = if !config.enabled {
            info!("Feature cache disabled by configuration");
            CacheBackend::NoOp(NoOpCacheService::new())
        } else {
            match config.backend.as_str() {
                "redis" | "dragonfly" => Self::create_redis_backend(config).await,
                "moka" | "memory" | "in-memory" => Self::create_moka_backend(config),
                "noop" | "none" => CacheBackend::NoOp(NoOpCacheService::new()),
                other => {
                    warn!(
                        backend = other,
                        "Unknown cache backend, falling back to NoOp"
                    );
                    CacheBackend::NoOp(NoOpCacheService::new())
                }
            }
        };

        Self { backend }
    }

    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        let service = match RedisCacheService::from_config(config) {
            Ok(service) => service,
            Err(e) => {
                warn!(
                    error = %e,
                    "Invalid Redis configuration, falling back to NoOp cache"
                );
                return CacheBackend::NoOp(NoOpCacheService::new());
            }
        };

        match service.connect().await {
            Ok(()) => info!(backend = "redis", "Feature cache connected"),
            Err(e) => warn!(
                error = %e,
                "Redis unreachable at startup, serving uncached until it recovers"
            ),
        }

        CacheBackend::Redis(Box::new(service))
    }

    fn create_moka_backend(config: &CacheConfig) -> CacheBackend {
        let service = MokaCacheService::from_config(&config.moka, config.ttl());
        info!(
            backend = "moka",
            max_capacity = config.moka.max_capacity,
            ttl_seconds = config.ttl_seconds,
            "In-memory feature cache initialized"
        );
        CacheBackend::Moka(Box::new(service))
    }

    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
        }
    }

    pub fn moka(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            backend: CacheBackend::Moka(Box::new(MokaCacheService::new(max_capacity, ttl))),
        }
    }
}

impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match &self.backend {
            CacheBackend::Redis(s) => s.get(key).await,
            CacheBackend::Moka(s) => s.get(key).await,
            CacheBackend::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match &self.backend {
            CacheBackend::Redis(s) => s.set(key, value, ttl).await,
            CacheBackend::Moka(s) => s.set(key, value, ttl).await,
            CacheBackend::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        match &self.backend {
            CacheBackend::Redis(s) => s.delete(key).await,
            CacheBackend::Moka(s) => s.delete(key).await,
            CacheBackend::NoOp(s) => s.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        match &self.backend {
            CacheBackend::Redis(s) => s.delete_pattern(pattern).await,
            CacheBackend::Moka(s) => s.delete_pattern(pattern).await,
            CacheBackend::NoOp(s) => s.delete_pattern(pattern).await,
        }
    }

    async fn backend_stats(&self) -> CacheResult<BackendStats> {
        match &self.backend {
            CacheBackend::Redis(s) => s.backend_stats().await,
            CacheBackend::Moka(s) => s.backend_stats().await,
            CacheBackend::NoOp(s) => s.backend_stats().await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match &self.backend {
            CacheBackend::Redis(s) => s.health_check().await,
            CacheBackend::Moka(s) => s.health_check().await,
            CacheBackend::NoOp(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match &self.backend {
            CacheBackend::Redis(s) => s.provider_name(),
            CacheBackend::Moka(s) => s.provider_name(),
            CacheBackend::NoOp(s) => s.provider_name(),
        }
    }

    fn is_distributed(&self) -> bool {
        match &self.backend {
            CacheBackend::Redis(s) => s.is_distributed(),
            CacheBackend::Moka(s) => s.is_distributed(),
            CacheBackend::NoOp(s) => s.is_distributed(),
        }
    }

    fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_config_uses_noop() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "noop");
        assert!(!provider.is_enabled());
    }

    #[tokio::test]
    async fn test_backend_aliases() {
        for alias in ["moka", "memory", "in-memory"] {
            let config = CacheConfig {
                backend: alias.to_string(),
                ..CacheConfig::default()
            };
            let provider = CacheProvider::from_config_graceful(&config).await;
            assert_eq!(provider.provider_name(), "moka", "alias {alias}");
        }
    }

    #[tokio::test]
    async fn test_unknown_backend_falls_back_to_noop() {
        let config = CacheConfig {
            backend: "memcached".to_string(),
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "noop");
    }

    #[tokio::test]
    async fn test_unreachable_redis_keeps_redis_backend() {
        let mut config = CacheConfig::default();
        config.redis.url = "redis://192.0.2.1:6379".to_string();
        config.connect_timeout_ms = 50;

        let provider = CacheProvider::from_config_graceful(&config).await;
        assert_eq!(provider.provider_name(), "redis");
        assert!(provider.is_distributed());
        assert!(provider.get("features:any").await.is_err());
    }

    #[tokio::test]
    async fn test_moka_dispatch_round_trip() {
        let provider = CacheProvider::moka(10, Duration::from_secs(60));
        provider
            .set("features:z", "payload", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            provider.get("features:z").await.unwrap().as_deref(),
            Some("payload")
        );
        assert_eq!(provider.delete_pattern("features:*").await.unwrap(), 1);
    }
}
