//! # TinyQuiz - Quiz Generation Backend
//!
//! Generates short-lived multiple-choice quizzes from an AI provider,
//! serves them to anonymous respondents, and reports results to the
//! quiz creator.
//!
//! ## Architecture
//! ```text
//! Frontend → TinyQuiz API → Gemini / NVIDIA
//!                 ↓
//!           Redis (documents)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod auth;
mod cleanup;
mod config;
mod error;
mod providers;
mod routes;
mod share;
mod state;
mod store;

use cleanup::cleanup_worker;
use config::AppConfig;
use state::AppState;

/// TinyQuiz - AI quiz generation API
#[derive(Parser, Debug)]
#[command(name = "tinyquiz")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/tinyquiz.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Frontend base URL used in share links and OAuth redirects
    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,

    /// Google Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// NVIDIA API key
    #[arg(long, env = "NVIDIA_API_KEY", hide_env_values = true)]
    nvidia_api_key: Option<String>,

    /// Keep everything in process memory instead of Redis
    #[arg(long, default_value = "false")]
    memory_store: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before clap reads the environment
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("🧠 Starting TinyQuiz v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let state = AppState::new(config.clone()).await?;
    info!("✅ Store ready: {}", state.store.backend());

    // Expired quiz sweeper
    let sweeper_store = state.store.clone();
    let sweeper_shutdown = shutdown_tx.subscribe();
    let interval = Duration::from_secs(config.cleanup.interval_secs);
    tokio::spawn(async move {
        cleanup_worker(sweeper_store, interval, sweeper_shutdown).await;
    });

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 TinyQuiz listening on {}", config.listen_addr);

    let shutdown_signal = async move {
        wait_for_shutdown().await;
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 TinyQuiz shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn wait_for_shutdown() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
