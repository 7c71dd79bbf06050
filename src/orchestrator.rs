//! # Detection Orchestrator
//!
//! Turns a payload into features with at most one extraction per distinct
//! content in flight:
//!
//! ```text
//! payload → fingerprint → cache.get ─ Found ────────────────────────→ Hit
//!                             │
//!                  NotFound | Unavailable
//!                             ▼
//!                  single_flight.work(fp) → executor → spawn(cache.set) → Miss
//! ```
//!
//! Cache failures degrade to a miss. Every call carries a deadline; a caller
//! that times out leaves the flight running so the result still lands in the
//! cache for the next request.

use crate::cache::{CacheLookup, CacheProvider, CacheService, CacheStore};
use crate::error::{FeatureError, FeatureResult};
use crate::executor::ComputeExecutor;
use crate::extraction::FeatureSet;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::single_flight::SingleFlightGroup;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn, Span};

type FlightValue = Result<Arc<FeatureSet>, FeatureError>;

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn is_hit(self) -> bool {
        self == Self::Hit
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
        }
    }
}

/// Per-request lifecycle, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Start,
    FingerprintComputed,
    CacheChecked { hit: bool },
    Computing,
    CacheWriteAttempted,
    Done,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Result of a successful `handle`
#[derive(Debug, Clone)]
pub struct Detection {
    pub features: Arc<FeatureSet>,
    pub cache_status: CacheStatus,
    pub elapsed: Duration,
    pub fingerprint: Fingerprint,
    pub was_leader: bool,
}

/// Point-in-time orchestrator counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorSnapshot {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub in_flight: usize,
    pub queue_depth: usize,
    pub running: usize,
    pub leaders: u64,
    pub followers: u64,
    pub compute_failures: u64,
    pub overloaded: u64,
    pub timeouts: u64,
    pub cache_unavailable: u64,
}

#[derive(Debug, Default)]
struct OrchestratorCounters {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    leaders: AtomicU64,
    followers: AtomicU64,
    compute_failures: AtomicU64,
    overloaded: AtomicU64,
    timeouts: AtomicU64,
    cache_unavailable: AtomicU64,
}

/// Cache-and-compute coordinator
pub struct Orchestrator<B: CacheService + 'static = CacheProvider> {
    cache: Arc<CacheStore<B>>,
    executor: Arc<ComputeExecutor>,
    flights: SingleFlightGroup<Fingerprint, FlightValue>,
    request_timeout: Duration,
    counters: OrchestratorCounters,
}

impl<B: CacheService + 'static> fmt::Debug for Orchestrator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache", &self.cache.provider_name())
            .field("executor", &self.executor)
            .field("flights", &self.flights)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl<B: CacheService + 'static> Orchestrator<B> {
    pub fn new(
        cache: Arc<CacheStore<B>>,
        executor: Arc<ComputeExecutor>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            executor,
            flights: SingleFlightGroup::new(),
            request_timeout,
            counters: OrchestratorCounters::default(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore<B>> {
        &self.cache
    }

    pub fn executor(&self) -> &Arc<ComputeExecutor> {
        &self.executor
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Detect features with the configured deadline
    pub async fn handle(
        &self,
        payload: impl Into<Bytes>,
        correlation_id: &str,
    ) -> FeatureResult<Detection> {
        self.handle_with_deadline(payload, correlation_id, self.request_timeout)
            .await
    }

    /// Detect features, giving up after `deadline`
    ///
    /// Never returns `CacheUnavailable` or `Cancelled`.
    #[instrument(
        name = "detect",
        skip_all,
        fields(
            correlation_id = %correlation_id,
            fingerprint = tracing::field::Empty,
            cache_status = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
        )
    )]
    pub async fn handle_with_deadline(
        &self,
        payload: impl Into<Bytes>,
        correlation_id: &str,
        deadline: Duration,
    ) -> FeatureResult<Detection> {
        let start = Instant::now();
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        transition(RequestState::Start);

        let payload: Bytes = payload.into();
        let fp = fingerprint(&payload);
        Span::current().record("fingerprint", fp.short().as_str());
        transition(RequestState::FingerprintComputed);

        let result = match tokio::time::timeout(deadline, self.resolve(fp, payload, start)).await
        {
            Ok(result) => result,
            Err(_) => Err(FeatureError::Timeout {
                waited_ms: start.elapsed().as_millis() as u64,
            }),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        Span::current().record("elapsed_ms", elapsed_ms);

        match &result {
            Ok(detection) => {
                Span::current().record("cache_status", detection.cache_status.to_string().as_str());
                transition(RequestState::Done);
                info!(
                    cache_status = %detection.cache_status,
                    was_leader = detection.was_leader,
                    feature_count = detection.features.feature_count,
                    elapsed_ms = elapsed_ms,
                    "Detection completed"
                );
            }
            Err(e) => {
                self.count_failure(e);
                transition(RequestState::Failed);
                warn!(
                    error_code = e.code(),
                    error = %e,
                    elapsed_ms = elapsed_ms,
                    "Detection failed"
                );
            }
        }

        result
    }

    async fn resolve(
        &self,
        fp: Fingerprint,
        payload: Bytes,
        start: Instant,
    ) -> FeatureResult<Detection> {
        match self.cache.get(&fp).await {
            CacheLookup::Found(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                transition(RequestState::CacheChecked { hit: true });
                return Ok(Detection {
                    features: Arc::new(entry.features),
                    cache_status: CacheStatus::Hit,
                    elapsed: start.elapsed(),
                    fingerprint: fp,
                    was_leader: false,
                });
            }
            CacheLookup::Unavailable => {
                self.counters.cache_unavailable.fetch_add(1, Ordering::Relaxed);
                debug!("Cache unavailable, computing");
            }
            CacheLookup::NotFound => {}
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        transition(RequestState::CacheChecked { hit: false });
        transition(RequestState::Computing);

        loop {
            let cache = Arc::clone(&self.cache);
            let executor = Arc::clone(&self.executor);
            let payload = payload.clone();

            let (value, was_leader) = self
                .flights
                .work(fp, move |waiters_gone| async move {
                    let late_cache = Arc::clone(&cache);
                    let result = executor
                        .submit_with_overrun(payload, waiters_gone, move |features| {
                            tokio::spawn(async move {
                                let _ = late_cache.set(&fp, &features).await;
                            });
                        })
                        .await
                        .map(Arc::new);
                    if let Ok(features) = &result {
                        let features = Arc::clone(features);
                        tokio::spawn(async move {
                            // failures are logged by the store
                            let _ = cache.set(&fp, &features).await;
                        });
                        transition(RequestState::CacheWriteAttempted);
                    }
                    result
                })
                .await
                .map_err(|e| FeatureError::compute_failure(e.to_string()))?;

            // joined a flight whose other waiters all left before it started
            if matches!(value, Err(FeatureError::Cancelled)) {
                debug!("Joined a cancelled flight, retrying");
                continue;
            }

            if was_leader {
                self.counters.leaders.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.followers.fetch_add(1, Ordering::Relaxed);
            }

            let features = value?;
            debug!(was_leader = was_leader, "Computation shared");
            return Ok(Detection {
                features,
                cache_status: CacheStatus::Miss,
                elapsed: start.elapsed(),
                fingerprint: fp,
                was_leader,
            });
        }
    }

    fn count_failure(&self, error: &FeatureError) {
        let counter = match error {
            FeatureError::Timeout { .. } => &self.counters.timeouts,
            FeatureError::Overloaded { .. } => &self.counters.overloaded,
            _ => &self.counters.compute_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            requests: self.counters.requests.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            in_flight: self.flights.in_flight(),
            queue_depth: self.executor.queue_depth(),
            running: self.executor.running(),
            leaders: self.counters.leaders.load(Ordering::Relaxed),
            followers: self.counters.followers.load(Ordering::Relaxed),
            compute_failures: self.counters.compute_failures.load(Ordering::Relaxed),
            overloaded: self.counters.overloaded.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            cache_unavailable: self.counters.cache_unavailable.load(Ordering::Relaxed),
        }
    }
}

fn transition(state: RequestState) {
    debug!(state = ?state, terminal = state.is_terminal(), "Request state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::providers::MokaCacheService;
    use crate::config::ExecutorConfig;
    use crate::extraction::LumaGridExtractor;

    fn orchestrator() -> Orchestrator<MokaCacheService> {
        let cache = Arc::new(CacheStore::new(
            MokaCacheService::new(100, Duration::from_secs(60)),
            Duration::from_secs(60),
        ));
        let executor = Arc::new(ComputeExecutor::new(
            Arc::new(LumaGridExtractor::default()),
            &ExecutorConfig::default(),
        ));
        Orchestrator::new(cache, executor, Duration::from_secs(5))
    }

    fn image() -> Vec<u8> {
        (0..64u32 * 64)
            .map(|i| if ((i % 64) / 8 + (i / 64) / 8) % 2 == 0 { 20 } else { 230 })
            .map(|v| v as u8)
            .collect()
    }

    async fn wait_for_write(orchestrator: &Orchestrator<MokaCacheService>, fp: &Fingerprint) {
        for _ in 0..100 {
            if orchestrator.cache().get(fp).await.is_found() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("cache write never landed");
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let orchestrator = orchestrator();

        let first = orchestrator.handle(image(), "req-1").await.unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert!(first.was_leader);
        assert!(first.features.feature_count > 0);

        wait_for_write(&orchestrator, &first.fingerprint).await;

        let second = orchestrator.handle(image(), "req-2").await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.features, first.features);
        assert_eq!(second.fingerprint, first.fingerprint);
    }

    #[tokio::test]
    async fn test_correlation_id_does_not_affect_fingerprint() {
        let orchestrator = orchestrator();
        let a = orchestrator.handle(image(), "one").await.unwrap();
        let b = orchestrator.handle(image(), "two").await.unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[tokio::test]
    async fn test_empty_payload_is_compute_failure() {
        let orchestrator = orchestrator();
        let err = orchestrator.handle(Vec::new(), "empty").await.unwrap_err();
        assert_eq!(err.code(), "COMPUTE_FAILURE");

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.compute_failures, 1);
        assert_eq!(snapshot.in_flight, 0);
    }

    #[tokio::test]
    async fn test_snapshot_counts() {
        let orchestrator = orchestrator();
        let first = orchestrator.handle(image(), "a").await.unwrap();
        wait_for_write(&orchestrator, &first.fingerprint).await;
        orchestrator.handle(image(), "b").await.unwrap();

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.leaders, 1);
        assert_eq!(snapshot.followers, 0);
        assert_eq!(snapshot.running, 0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestState::Done.is_terminal());
        assert!(RequestState::Failed.is_terminal());
        assert!(!RequestState::Computing.is_terminal());
        assert!(!RequestState::CacheChecked { hit: true }.is_terminal());
    }
}
