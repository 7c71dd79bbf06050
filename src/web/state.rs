//! # Web API Application State
//!
//! Shared state handed to every handler: the orchestrator, the loaded
//! configuration and readiness flags.

use crate::config::ServiceConfig;
use crate::orchestrator::Orchestrator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for axum handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<ServiceConfig>,
    started_at: Instant,
    extractor_ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<ServiceConfig>) -> Self {
        Self {
            orchestrator,
            config,
            started_at: Instant::now(),
            extractor_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record that the extractor has completed its warm-up
    pub fn mark_extractor_ready(&self) {
        self.extractor_ready.store(true, Ordering::Release);
    }

    pub fn extractor_ready(&self) -> bool {
        self.extractor_ready.load(Ordering::Acquire)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Ready to take detection traffic
    pub fn is_ready(&self) -> bool {
        self.extractor_ready() && !self.orchestrator.executor().is_saturated()
    }
}
