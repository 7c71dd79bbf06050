#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, Moka in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Feature Cache
//!
//! Content-addressable cache-and-compute service for image feature
//! extraction.
//!
//! ## Overview
//!
//! A payload is fingerprinted with SHA-256. A result cached under that
//! fingerprint is returned directly; otherwise the CPU-bound extractor runs
//! once on a bounded executor, no matter how many identical requests arrive
//! while it runs, and the result is written back to the cache.
//!
//! The cache is an accelerator, never a dependency: an unreachable backend
//! turns every lookup into a miss and every write into a logged no-op.
//!
//! ## Module Organization
//!
//! - [`fingerprint`] - SHA-256 content identity
//! - [`cache`] - fingerprint-keyed store over Redis, Moka or nothing
//! - [`executor`] - bounded pool running the extractor off the async runtime
//! - [`single_flight`] - per-key deduplication of concurrent work
//! - [`orchestrator`] - composes the above into `handle(payload)`
//! - [`extraction`] - extractor strategy trait and the default extractor
//! - [`web`] - axum HTTP surface
//! - [`config`] - layered configuration
//! - [`logging`] - tracing subscriber setup
//! - [`resilience`] - circuit breaker guarding the distributed cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feature_cache::cache::{CacheProvider, CacheStore};
//! use feature_cache::config::ExecutorConfig;
//! use feature_cache::executor::ComputeExecutor;
//! use feature_cache::extraction::LumaGridExtractor;
//! use feature_cache::orchestrator::Orchestrator;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(image: Vec<u8>) -> Result<(), feature_cache::FeatureError> {
//! let cache = Arc::new(CacheStore::new(
//!     CacheProvider::moka(10_000, Duration::from_secs(3600)),
//!     Duration::from_secs(3600),
//! ));
//! let executor = Arc::new(ComputeExecutor::new(
//!     Arc::new(LumaGridExtractor::default()),
//!     &ExecutorConfig::default(),
//! ));
//! let orchestrator = Orchestrator::new(cache, executor, Duration::from_secs(10));
//!
//! let detection = orchestrator.handle(image, "request-1").await?;
//! println!(
//!     "{} keypoints ({})",
//!     detection.features.feature_count, detection.cache_status
//! );
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod extraction;
pub mod fingerprint;
pub mod logging;
pub mod orchestrator;
pub mod resilience;
pub mod single_flight;
pub mod web;

pub use cache::{CacheLookup, CacheProvider, CacheService, CacheStore};
pub use config::{ConfigLoader, ConfigurationError, ServiceConfig};
pub use error::{FeatureError, FeatureResult};
pub use executor::ComputeExecutor;
pub use extraction::{ExtractionError, FeatureExtractor, FeatureSet, LumaGridExtractor};
pub use fingerprint::{fingerprint, Fingerprint};
pub use orchestrator::{CacheStatus, Detection, Orchestrator, OrchestratorSnapshot, RequestState};
pub use single_flight::{FlightError, SingleFlightGroup, WaitersGone};
