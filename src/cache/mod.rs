//! # Feature Cache
//!
//! - [`traits::CacheService`]: raw key-value contract implemented by backends
//! - [`providers`]: Redis, Moka and no-op backends
//! - [`provider::CacheProvider`]: backend chosen from configuration
//! - [`store::CacheStore`]: fingerprint-keyed store with degradation semantics

pub mod errors;
pub mod provider;
pub mod providers;
pub mod store;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use provider::CacheProvider;
pub use store::{CacheEntry, CacheLookup, CacheStats, CacheStore};
pub use traits::{BackendStats, CacheService};

use crate::config::CacheConfig;

/// Build the configured store, with a circuit breaker when enabled
pub async fn build_store(config: &CacheConfig) -> CacheStore<CacheProvider> {
    let provider = CacheProvider::from_config_graceful(config).await;
    let store = CacheStore::new(provider, config.ttl());
    if config.circuit_breaker.enabled {
        store.with_circuit_breaker((&config.circuit_breaker).into())
    } else {
        store
    }
}
