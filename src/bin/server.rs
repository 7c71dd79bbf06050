//! # Feature Cache Server
//!
//! Serves the feature detection API over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Run with defaults (Redis at localhost, port 8000)
//! cargo run --bin feature-cache-server
//!
//! # Run with a config file and an in-process cache
//! FEATURE_CACHE_CACHE__BACKEND=moka cargo run --bin feature-cache-server -- --config config/local.toml
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use feature_cache::cache::build_store;
use feature_cache::config::ConfigLoader;
use feature_cache::executor::ComputeExecutor;
use feature_cache::extraction::LumaGridExtractor;
use feature_cache::logging;
use feature_cache::orchestrator::Orchestrator;
use feature_cache::web::{create_app, state::AppState};

#[derive(Parser, Debug)]
#[command(name = "feature-cache-server", version, about = "Cached image feature detection service")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding web.bind_address
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    let mut config = loader.load().context("Failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.web.bind_address = bind;
    }

    logging::init_logging(&config.environment, &config.logging);

    info!("Starting feature cache server");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Environment: {}", config.environment);
    info!(
        "   Build Mode: {}",
        if cfg!(debug_assertions) {
            "Debug"
        } else {
            "Release"
        }
    );

    let addr = config.web.socket_addr().context("Invalid bind address")?;

    let cache = Arc::new(build_store(&config.cache).await);
    info!(
        provider = cache.provider_name(),
        enabled = cache.is_enabled(),
        "Cache store ready"
    );

    let executor = Arc::new(ComputeExecutor::new(
        Arc::new(LumaGridExtractor::default()),
        &config.executor,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        Arc::clone(&executor),
        config.request.timeout(),
    ));

    let state = AppState::new(orchestrator, Arc::new(config));
    match executor.warm_up().await {
        Ok(()) => {
            state.mark_extractor_ready();
            info!(extractor = executor.extractor_name(), "Extractor warmed up");
        }
        Err(e) => warn!(error = %e, "Extractor warm-up failed, readiness probe will report not ready"),
    }

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Listening");
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Feature cache server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
