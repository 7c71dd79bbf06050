//! Shared test doubles: a controllable cache backend and a counting extractor.

#![allow(dead_code)]

use feature_cache::cache::{BackendStats, CacheError, CacheResult, CacheService, CacheStore};
use feature_cache::config::ExecutorConfig;
use feature_cache::executor::ComputeExecutor;
use feature_cache::extraction::{ExtractionError, FeatureExtractor, FeatureSet};
use feature_cache::orchestrator::Orchestrator;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ControllableInner {
    entries: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    latency_ms: AtomicU64,
}

/// In-memory backend that can be switched offline
///
/// Clones share state, so a test keeps one handle while the store owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ControllableCache {
    inner: Arc<ControllableInner>,
    distributed: bool,
}

impl ControllableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report as a network backend so the store guards it with a breaker
    pub fn distributed() -> Self {
        Self {
            distributed: true,
            ..Self::default()
        }
    }

    pub fn set_online(&self, online: bool) {
        self.inner.offline.store(!online, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Read attempts that reached the backend, online or not
    pub fn reads(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.entries.lock().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    async fn round_trip(&self) -> CacheResult<()> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("backend offline".to_string()));
        }
        Ok(())
    }
}

impl CacheService for ControllableCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self.inner.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
        self.round_trip().await?;
        self.inner
            .entries
            .lock()
            .insert(key.to_string(), value.to_string());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.round_trip().await?;
        Ok(self.inner.entries.lock().remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.round_trip().await?;
        let prefix = pattern.trim_end_matches('*');
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn backend_stats(&self) -> CacheResult<BackendStats> {
        self.round_trip().await?;
        Ok(BackendStats {
            key_count: Some(self.len() as u64),
            memory_bytes: None,
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.round_trip().await?;
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "controllable"
    }

    fn is_distributed(&self) -> bool {
        self.distributed
    }
}

/// Deterministic extractor that counts invocations
#[derive(Debug, Default)]
pub struct CountingExtractor {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn failing_with_delay(delay: Duration) -> Self {
        Self {
            delay,
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeatureExtractor for CountingExtractor {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn extract(&self, payload: &[u8]) -> Result<FeatureSet, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(ExtractionError::Failed("configured to fail".to_string()));
        }
        expected_features(payload)
    }

    fn warm_up(&self) -> Result<(), ExtractionError> {
        Ok(())
    }
}

/// What [`CountingExtractor`] returns for a payload
pub fn expected_features(payload: &[u8]) -> Result<FeatureSet, ExtractionError> {
    let feature_count = 1 + payload.len() % 7;
    let descriptors = (0..feature_count * 4)
        .map(|i| payload.get(i % payload.len().max(1)).copied().unwrap_or(0))
        .collect();
    FeatureSet::new(feature_count, 4, descriptors)
}

pub fn executor_config(workers: usize, queue_capacity: usize) -> ExecutorConfig {
    ExecutorConfig {
        workers,
        queue_capacity,
        ..ExecutorConfig::default()
    }
}

pub fn orchestrator(
    cache: &ControllableCache,
    extractor: &Arc<CountingExtractor>,
    config: &ExecutorConfig,
) -> Orchestrator<ControllableCache> {
    let store = Arc::new(CacheStore::new(cache.clone(), Duration::from_secs(3600)));
    let executor = Arc::new(ComputeExecutor::new(extractor.clone(), config));
    Orchestrator::new(store, executor, Duration::from_secs(5))
}

/// Poll until `check` holds or a second passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
