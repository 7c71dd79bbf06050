//! # Compute Executor
//!
//! Bounded pool for the CPU-bound extractor. Work runs on tokio's blocking
//! thread pool, gated by a semaphore sized to `workers`. Admission is capped
//! at `workers + queue_capacity`; anything beyond that is rejected with
//! `Overloaded` instead of queuing without bound.
//!
//! ```text
//! submit() → [admission counter] → [Semaphore] → spawn_blocking(extract) → result
//!                 │ full                 │ cancel while waiting
//!                 ▼                      ▼
//!             Overloaded             Cancelled
//! ```
//!
//! The worker permit and the admission slot move into the blocking closure,
//! so a slot is released only when the extractor actually returns. A
//! computation that overruns `compute_timeout` is reported as a failure, but
//! a detached task keeps waiting for it and hands a late success to the
//! submitter's overrun callback.

mod admission;

use crate::config::ExecutorConfig;
use crate::error::{FeatureError, FeatureResult};
use crate::extraction::{ExtractionError, FeatureExtractor, FeatureSet};
use admission::{AdmissionGuard, AdmissionLimiter, RunningGuard};
use bytes::Bytes;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Point-in-time executor counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorMetrics {
    pub workers: usize,
    pub queue_capacity: usize,
    pub running: usize,
    pub queued: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub timed_out: u64,
}

#[derive(Debug, Default)]
struct ExecutorCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
}

/// Bounded executor for a [`FeatureExtractor`]
pub struct ComputeExecutor {
    extractor: Arc<dyn FeatureExtractor>,
    semaphore: Arc<Semaphore>,
    limiter: Arc<AdmissionLimiter>,
    workers: usize,
    queue_capacity: usize,
    compute_timeout: Duration,
    counters: ExecutorCounters,
}

impl std::fmt::Debug for ComputeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeExecutor")
            .field("extractor", &self.extractor.name())
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("running", &self.running())
            .field("queued", &self.queue_depth())
            .finish()
    }
}

impl ComputeExecutor {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, config: &ExecutorConfig) -> Self {
        let workers = config.workers.max(1);
        debug!(
            extractor = extractor.name(),
            workers = workers,
            queue_capacity = config.queue_capacity,
            compute_timeout_ms = config.compute_timeout_ms,
            "Compute executor created"
        );

        Self {
            extractor,
            semaphore: Arc::new(Semaphore::new(workers)),
            limiter: Arc::new(AdmissionLimiter::new(workers + config.queue_capacity)),
            workers,
            queue_capacity: config.queue_capacity,
            compute_timeout: config.compute_timeout(),
            counters: ExecutorCounters::default(),
        }
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Worker count
    pub fn capacity(&self) -> usize {
        self.workers
    }

    /// Extractions currently executing
    pub fn running(&self) -> usize {
        self.limiter.running()
    }

    /// Admitted submissions still waiting for a worker
    pub fn queue_depth(&self) -> usize {
        self.limiter.admitted().saturating_sub(self.limiter.running())
    }

    /// True when a new submission would be rejected
    pub fn is_saturated(&self) -> bool {
        self.limiter.admitted() >= self.limiter.limit()
    }

    pub fn metrics(&self) -> ExecutorMetrics {
        ExecutorMetrics {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            running: self.running(),
            queued: self.queue_depth(),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Run the extractor on a payload
    pub async fn submit(&self, payload: Bytes) -> FeatureResult<FeatureSet> {
        self.submit_cancellable(payload, std::future::pending::<()>())
            .await
    }

    /// Run the extractor, abandoning the submission if `cancel` resolves
    /// before a worker is free
    ///
    /// Once the extractor has started it runs to completion regardless of
    /// `cancel` or of this future being dropped.
    pub async fn submit_cancellable<C>(&self, payload: Bytes, cancel: C) -> FeatureResult<FeatureSet>
    where
        C: Future<Output = ()>,
    {
        self.submit_with_overrun(payload, cancel, |_| {}).await
    }

    /// Like [`submit_cancellable`](Self::submit_cancellable), with a callback
    /// for a result that arrives after the compute timeout
    ///
    /// The caller still receives `ComputeFailure` on overrun. If the
    /// extractor later returns valid features, `on_overrun` is called with
    /// them from a background task.
    pub async fn submit_with_overrun<C, F>(
        &self,
        payload: Bytes,
        cancel: C,
        on_overrun: F,
    ) -> FeatureResult<FeatureSet>
    where
        C: Future<Output = ()>,
        F: FnOnce(FeatureSet) + Send + 'static,
    {
        let admission = self.admit()?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        tokio::pin!(cancel);
        let permit = tokio::select! {
            biased;
            _ = &mut cancel => {
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!("Queued computation cancelled before start");
                return Err(FeatureError::Cancelled);
            }
            permit = self.semaphore.clone().acquire_owned() => permit.map_err(|_| {
                FeatureError::compute_failure("compute executor is shut down")
            })?,
        };

        self.execute(payload, admission, permit, on_overrun).await
    }

    fn admit(&self) -> FeatureResult<AdmissionGuard> {
        AdmissionLimiter::try_admit(&self.limiter).ok_or_else(|| {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            let running = self.running();
            let queued = self.queue_depth();
            warn!(
                running = running,
                queued = queued,
                "Compute executor overloaded, rejecting submission"
            );
            FeatureError::Overloaded { running, queued }
        })
    }

    async fn execute<F>(
        &self,
        payload: Bytes,
        admission: AdmissionGuard,
        permit: tokio::sync::OwnedSemaphorePermit,
        on_overrun: F,
    ) -> FeatureResult<FeatureSet>
    where
        F: FnOnce(FeatureSet) + Send + 'static,
    {
        let extractor = Arc::clone(&self.extractor);
        let running = RunningGuard::enter(&self.limiter);
        let start = Instant::now();

        let mut handle = tokio::task::spawn_blocking(move || {
            let _slot = (admission, permit, running);
            std::panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(&payload)))
        });

        let outcome = tokio::time::timeout(self.compute_timeout, &mut handle).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(Ok(Ok(features)))) => match features.validate() {
                Ok(()) => Ok(features),
                Err(e) => Err(FeatureError::compute_failure(e.to_string())),
            },
            Ok(Ok(Ok(Err(extraction_error)))) => {
                Err(FeatureError::compute_failure(extraction_error.to_string()))
            }
            Ok(Ok(Err(panic_error))) => {
                let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_error.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!(
                    extractor = self.extractor.name(),
                    panic_msg = %panic_msg,
                    elapsed_ms = elapsed_ms,
                    "Extractor panicked"
                );
                Err(FeatureError::compute_failure(format!(
                    "extractor panicked: {panic_msg}"
                )))
            }
            Ok(Err(join_error)) => Err(FeatureError::compute_failure(format!(
                "extraction task failed: {join_error}"
            ))),
            Err(_) => {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                error!(
                    extractor = self.extractor.name(),
                    timeout_ms = self.compute_timeout.as_millis() as u64,
                    "Extraction exceeded compute timeout"
                );
                follow_overrun(self.extractor.name(), handle, on_overrun);
                Err(FeatureError::compute_failure(format!(
                    "extraction exceeded {}ms",
                    self.compute_timeout.as_millis()
                )))
            }
        };

        match &result {
            Ok(features) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    extractor = self.extractor.name(),
                    feature_count = features.feature_count,
                    elapsed_ms = elapsed_ms,
                    "Extraction completed"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, elapsed_ms = elapsed_ms, "Extraction failed");
            }
        }

        result
    }

    /// Run the extractor's warm-up routine on the pool
    pub async fn warm_up(&self) -> FeatureResult<()> {
        let extractor = Arc::clone(&self.extractor);
        let start = Instant::now();
        tokio::task::spawn_blocking(move || extractor.warm_up())
            .await
            .map_err(|e| FeatureError::compute_failure(format!("warm-up task failed: {e}")))?
            .map_err(|e| FeatureError::compute_failure(e.to_string()))?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extractor warmed up"
        );
        Ok(())
    }
}

type ExtractionOutcome = std::thread::Result<Result<FeatureSet, ExtractionError>>;

/// Keep waiting on an overrunning extraction and pass on a valid late result
fn follow_overrun<F>(
    extractor: &'static str,
    handle: tokio::task::JoinHandle<ExtractionOutcome>,
    on_overrun: F,
) where
    F: FnOnce(FeatureSet) + Send + 'static,
{
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(Ok(features))) if features.validate().is_ok() => {
                debug!(
                    extractor = extractor,
                    feature_count = features.feature_count,
                    "Overrunning extraction finished, keeping its result"
                );
                on_overrun(features);
            }
            _ => debug!(
                extractor = extractor,
                "Overrunning extraction produced no usable result"
            ),
        }
    });
}
