//! # Structured Logging
//!
//! Environment-aware `tracing` setup. Console output gets ANSI colors only on
//! a terminal; JSON output is meant for log shippers.

use crate::config::{LogFormat, LoggingConfig};
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize logging once per process
///
/// `RUST_LOG` wins over the configured level, which wins over the
/// environment-derived default. An already installed global subscriber is
/// left in place.
pub fn init_logging(environment: &str, config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(environment).to_string());
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let result = match config.format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(true)
                        .with_filter(filter()),
                )
                .try_init(),
            LogFormat::Console => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(std::io::stdout().is_terminal())
                        .with_filter(filter()),
                )
                .try_init(),
        };

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized, keeping it");
        }

        tracing::info!(
            environment = %environment,
            level = %level,
            format = ?config.format,
            "Structured logging initialized"
        );
    });
}

/// Initialize logging for tests; safe to call from every test
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Detect the deployment environment from process variables
pub fn get_environment() -> String {
    std::env::var("FEATURE_CACHE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default level for an environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
