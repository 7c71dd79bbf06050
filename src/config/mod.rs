//! # Configuration Management
//!
//! Typed service configuration. Every section deserializes with defaults so a
//! configuration file only needs to name the values it overrides.
//!
//! Loading order (lowest to highest precedence) is handled by [`loader`]:
//! compiled-in defaults, an optional TOML file, then `FEATURE_CACHE_*`
//! environment variables.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration for the feature cache service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deployment environment (`development`, `test`, `production`)
    pub environment: String,
    pub cache: CacheConfig,
    pub executor: ExecutorConfig,
    pub request: RequestConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

/// Cache store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false the no-op backend is used regardless of `backend`
    pub enabled: bool,
    /// `redis` (alias `dragonfly`), `moka` (aliases `memory`, `in-memory`) or `noop`
    pub backend: String,
    /// TTL applied to every written entry
    pub ttl_seconds: u64,
    /// Bound on a single connection attempt to a distributed backend
    pub connect_timeout_ms: u64,
    /// After a failed connection attempt, operations fail fast for this long
    pub reconnect_backoff_ms: u64,
    /// Bound on any single backend operation
    pub operation_timeout_ms: u64,
    pub redis: RedisConfig,
    pub moka: MokaConfig,
    pub circuit_breaker: CacheCircuitBreakerConfig,
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

/// In-process cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MokaConfig {
    pub max_capacity: u64,
}

/// Circuit breaker guarding distributed cache backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: u64,
    pub success_threshold: u32,
}

/// Compute executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of concurrently running extractions
    pub workers: usize,
    /// Submissions allowed to wait for a worker before `Overloaded` is returned
    pub queue_capacity: usize,
    /// Upper bound on a single extraction
    pub compute_timeout_ms: u64,
}

/// Per-request orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline applied to each `handle` call
    pub timeout_ms: u64,
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub max_image_size_mb: u64,
    pub allowed_extensions: Vec<String>,
    /// Outer timeout applied by the HTTP layer
    pub request_timeout_ms: u64,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit level filter; derived from the environment when unset
    pub level: Option<String>,
    /// `json` or `console`
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            cache: CacheConfig::default(),
            executor: ExecutorConfig::default(),
            request: RequestConfig::default(),
            web: WebConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "redis".to_string(),
            ttl_seconds: 3600,
            connect_timeout_ms: 2000,
            reconnect_backoff_ms: 1000,
            operation_timeout_ms: 500,
            redis: RedisConfig::default(),
            moka: MokaConfig::default(),
            circuit_breaker: CacheCircuitBreakerConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
        }
    }
}

impl Default for MokaConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl Default for CacheCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_timeout_seconds: 30,
            success_threshold: 2,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 32,
            compute_timeout_ms: 30_000,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_image_size_mb: 10,
            allowed_extensions: ["jpg", "jpeg", "png", "bmp", "tif", "tiff"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Console,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl CacheCircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_seconds)
    }
}

impl ExecutorConfig {
    pub fn compute_timeout(&self) -> Duration {
        Duration::from_millis(self.compute_timeout_ms)
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl WebConfig {
    pub fn max_image_size_bytes(&self) -> usize {
        (self.max_image_size_mb as usize) * 1024 * 1024
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address.parse().map_err(|e: std::net::AddrParseError| {
            ConfigurationError::invalid_value("web.bind_address", &self.bind_address, e.to_string())
        })
    }

    /// Case-insensitive extension check
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

impl ServiceConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate ranges and required values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.ttl_seconds < 60 {
            return Err(ConfigurationError::invalid_value(
                "cache.ttl_seconds",
                self.cache.ttl_seconds.to_string(),
                "must be at least 60 seconds",
            ));
        }

        if self.cache.connect_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.connect_timeout_ms",
                "0",
                "must be greater than 0",
            ));
        }

        if self.cache.operation_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.operation_timeout_ms",
                "0",
                "must be greater than 0",
            ));
        }

        if self.cache.enabled
            && matches!(self.cache.backend.as_str(), "redis" | "dragonfly")
            && self.cache.redis.url.is_empty()
        {
            return Err(ConfigurationError::missing_required_field(
                "url",
                "cache.redis",
            ));
        }

        if self.cache.moka.max_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.moka.max_capacity",
                "0",
                "must be greater than 0",
            ));
        }

        let cb = &self.cache.circuit_breaker;
        if cb.enabled {
            if cb.failure_threshold == 0 {
                return Err(ConfigurationError::invalid_value(
                    "cache.circuit_breaker.failure_threshold",
                    "0",
                    "must be greater than 0",
                ));
            }
            if cb.success_threshold == 0 {
                return Err(ConfigurationError::invalid_value(
                    "cache.circuit_breaker.success_threshold",
                    "0",
                    "must be greater than 0",
                ));
            }
            if cb.recovery_timeout_seconds == 0 || cb.recovery_timeout_seconds > 300 {
                return Err(ConfigurationError::invalid_value(
                    "cache.circuit_breaker.recovery_timeout_seconds",
                    cb.recovery_timeout_seconds.to_string(),
                    "must be between 1 and 300",
                ));
            }
        }

        if !(1..=64).contains(&self.executor.workers) {
            return Err(ConfigurationError::invalid_value(
                "executor.workers",
                self.executor.workers.to_string(),
                "must be between 1 and 64",
            ));
        }

        if self.executor.compute_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.compute_timeout_ms",
                "0",
                "must be greater than 0",
            ));
        }

        if self.request.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "request.timeout_ms",
                "0",
                "must be greater than 0",
            ));
        }

        if !(1..=100).contains(&self.web.max_image_size_mb) {
            return Err(ConfigurationError::invalid_value(
                "web.max_image_size_mb",
                self.web.max_image_size_mb.to_string(),
                "must be between 1 and 100",
            ));
        }

        if self.web.allowed_extensions.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "allowed_extensions",
                "web",
            ));
        }

        self.web.socket_addr()?;

        Ok(())
    }
}
