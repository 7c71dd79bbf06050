//! # Feature Cache Store
//!
//! Fingerprint-keyed store on top of a [`CacheService`] backend. Reads
//! classify into found, not found and unavailable; writes are best-effort.
//! Serialization, TTL, hit/miss accounting and the circuit breaker live
//! here so every backend gets identical semantics.

use super::errors::{CacheError, CacheResult};
use super::provider::CacheProvider;
use super::traits::CacheService;
use crate::constants::{CACHE_ENTRY_FORMAT_VERSION, CACHE_KEY_PATTERN};
use crate::extraction::FeatureSet;
use crate::fingerprint::Fingerprint;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A stored result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format_version: u32,
    pub features: FeatureSet,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// Outcome of a cache read
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Found(CacheEntry),
    NotFound,
    /// The backend could not be consulted; callers treat this as a miss
    Unavailable,
}

impl CacheLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Hit/miss counters plus backend-reported size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub provider: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub unavailable: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub key_count: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub circuit_breaker: Option<CircuitBreakerMetrics>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    unavailable: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

/// Fingerprint-keyed feature cache
#[derive(Debug)]
pub struct CacheStore<B: CacheService = CacheProvider> {
    backend: B,
    ttl: Duration,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    counters: CacheCounters,
}

impl<B: CacheService> CacheStore<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            circuit_breaker: None,
            counters: CacheCounters::default(),
        }
    }

    /// Guard the backend with a circuit breaker; ignored for local backends
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        if self.backend.is_distributed() && self.backend.is_enabled() {
            self.circuit_breaker = Some(Arc::new(CircuitBreaker::new("feature_cache", config)));
        }
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    /// Breaker counters, when the backend is guarded by one
    pub fn circuit_metrics(&self) -> Option<CircuitBreakerMetrics> {
        self.circuit_breaker.as_ref().map(|cb| cb.metrics())
    }

    /// Run a backend call through the circuit breaker, if any
    async fn guarded<T, F, Fut>(&self, op: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let Some(cb) = self.circuit_breaker.as_ref() else {
            return op().await;
        };

        if !cb.should_allow() {
            return Err(CacheError::CircuitOpen(self.provider_name().to_string()));
        }

        let start = Instant::now();
        let result = op().await;
        match &result {
            Ok(_) => cb.record_success(start.elapsed()),
            Err(_) => cb.record_failure(start.elapsed()),
        }
        result
    }

    /// Read the entry for a fingerprint
    ///
    /// Entries that fail to decode are deleted and reported as not found.
    pub async fn get(&self, fingerprint: &Fingerprint) -> CacheLookup {
        let key = fingerprint.cache_key();

        let raw = match self.guarded(|| self.backend.get(&key)).await {
            Ok(raw) => raw,
            Err(e) => {
                self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
                warn!(
                    fingerprint = %fingerprint.short(),
                    error = %e,
                    "Cache read failed, treating as unavailable"
                );
                return CacheLookup::Unavailable;
            }
        };

        let Some(raw) = raw else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return CacheLookup::NotFound;
        };

        match decode_entry(&raw) {
            Ok(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Found(entry)
            }
            Err(e) => {
                warn!(
                    fingerprint = %fingerprint.short(),
                    error = %e,
                    "Corrupt cache entry, deleting"
                );
                if let Err(e) = self.guarded(|| self.backend.delete(&key)).await {
                    debug!(error = %e, "Failed to delete corrupt cache entry");
                }
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::NotFound
            }
        }
    }

    /// Store a result with the configured TTL
    pub async fn set(&self, fingerprint: &Fingerprint, features: &FeatureSet) -> CacheResult<()> {
        self.set_with_ttl(fingerprint, features, self.ttl).await
    }

    /// Store a result; failures are logged and returned but never fatal
    pub async fn set_with_ttl(
        &self,
        fingerprint: &Fingerprint,
        features: &FeatureSet,
        ttl: Duration,
    ) -> CacheResult<()> {
        let entry = CacheEntry {
            format_version: CACHE_ENTRY_FORMAT_VERSION,
            features: features.clone(),
            stored_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
        };
        let value = serde_json::to_string(&entry)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let key = fingerprint.cache_key();

        let result = self.guarded(|| self.backend.set(&key, &value, ttl)).await;
        match &result {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    fingerprint = %fingerprint.short(),
                    ttl_seconds = ttl.as_secs(),
                    bytes = value.len(),
                    "Cached feature set"
                );
            }
            Err(e) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    fingerprint = %fingerprint.short(),
                    error = %e,
                    "Cache write failed"
                );
            }
        }
        result
    }

    /// Remove one entry, returning whether it existed
    pub async fn delete(&self, fingerprint: &Fingerprint) -> CacheResult<bool> {
        let key = fingerprint.cache_key();
        self.guarded(|| self.backend.delete(&key)).await
    }

    /// Remove every feature entry, returning the number deleted
    pub async fn flush_all(&self) -> CacheResult<u64> {
        let deleted = self
            .guarded(|| self.backend.delete_pattern(CACHE_KEY_PATTERN))
            .await?;
        debug!(deleted = deleted, "Flushed feature cache");
        Ok(deleted)
    }

    /// Counters plus backend size; errors when the backend is unreachable
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let backend = self.guarded(|| self.backend.backend_stats()).await?;
        Ok(CacheStats {
            provider: self.provider_name(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            unavailable: self.counters.unavailable.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
            key_count: backend.key_count,
            memory_bytes: backend.memory_bytes,
            circuit_breaker: self.circuit_metrics(),
        })
    }

    /// Zero the in-process counters
    pub fn reset_stats(&self) {
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.unavailable.store(0, Ordering::Relaxed);
        self.counters.writes.store(0, Ordering::Relaxed);
        self.counters.write_failures.store(0, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.counters.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.counters.misses.load(Ordering::Relaxed)
    }

    /// Whether the backend answers right now
    pub async fn health_check(&self) -> bool {
        matches!(
            self.guarded(|| self.backend.health_check()).await,
            Ok(true)
        )
    }
}

fn decode_entry(raw: &str) -> CacheResult<CacheEntry> {
    let entry: CacheEntry =
        serde_json::from_str(raw).map_err(|e| CacheError::SerializationError(e.to_string()))?;
    if entry.format_version != CACHE_ENTRY_FORMAT_VERSION {
        return Err(CacheError::SerializationError(format!(
            "unsupported entry version {}",
            entry.format_version
        )));
    }
    entry
        .features
        .validate()
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    Ok(entry)
}
