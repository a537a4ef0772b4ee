//! piq-analysis - Repository Analysis Service
//!
//! Accepts GitHub repository URLs, runs the ingestion and evaluation pipeline
//! on a bounded worker pool and streams progress to the requesting user.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use piq_analysis::collaborators::{NoopEvaluator, NullClassifier, SqliteResultStore};
use piq_analysis::github::{GitHubClient, GitHubClientConfig};
use piq_analysis::ingestion::{GitHubSource, IngestionPipeline};
use piq_analysis::lock::{LockManager, SqliteLockStore};
use piq_analysis::orchestrator::{AnalysisServices, Orchestrator, WorkerPool};
use piq_analysis::progress::{spawn_idle_reaper, ProgressHub};
use piq_analysis::AppState;

/// Command-line arguments for piq-analysis
#[derive(Parser, Debug)]
#[command(name = "piq-analysis")]
#[command(about = "Repository analysis service for PortfolioIQ")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file shared by all instances on this host (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = piq_common::config::load_config(args.config.as_deref(), "piq-analysis")
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("Invalid configuration")?;

    info!("Starting piq-analysis (Repository Analysis) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database.path.display());
    info!("GitHub API: {}", config.github.api_url);

    let db_pool = piq_common::db::init_database(&config.database.path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let github = GitHubClient::new(GitHubClientConfig::from_config(&config.github)?)
        .context("Failed to build GitHub client")?;

    let hub = Arc::new(ProgressHub::new(Duration::from_secs(config.progress.idle_timeout_secs)));
    let shutdown = CancellationToken::new();
    let reaper = spawn_idle_reaper(
        Arc::clone(&hub),
        Duration::from_secs(config.progress.reap_interval_secs.max(1)),
        shutdown.clone(),
    );

    let services = AnalysisServices {
        locks: LockManager::new(
            Arc::new(SqliteLockStore::new(db_pool.clone())),
            Duration::from_secs(config.analysis.lock_ttl_secs),
        ),
        pipeline: IngestionPipeline::new(
            Arc::new(GitHubSource::new(Arc::new(github))),
            Arc::new(NullClassifier),
            Arc::clone(&hub),
            config.analysis.max_repository_size_kb,
        ),
        evaluator: Arc::new(NoopEvaluator),
        store: Arc::new(SqliteResultStore::new(db_pool.clone())),
        hub: Arc::clone(&hub),
    };
    let pool = WorkerPool::new(config.analysis.workers, config.analysis.queue_capacity);
    let orchestrator = Arc::new(Orchestrator::new(services, pool));
    info!("No AI evaluator configured, using NoopEvaluator");

    let state = AppState::new(Arc::clone(&orchestrator), hub, &config.server.identity_header);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    piq_analysis::serve(listener, state, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Waiting for in-flight analyses to finish");
    orchestrator.shutdown().await;
    shutdown.cancel();
    let _ = reaper.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
