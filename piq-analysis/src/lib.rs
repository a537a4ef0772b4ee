//! piq-analysis library interface
//!
//! Repository analysis core: distributed analysis lock, resilient GitHub
//! client, ingestion pipeline, progress hub and the orchestrator that ties
//! them together, plus the HTTP surface exposing them.

pub mod api;
pub mod collaborators;
pub mod error;
pub mod github;
pub mod ingestion;
pub mod lock;
pub mod orchestrator;
pub mod progress;
pub mod target;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;
use crate::progress::ProgressHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub hub: Arc<ProgressHub>,
    /// Lowercase name of the trusted identity header
    pub identity_header: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, hub: Arc<ProgressHub>, identity_header: &str) -> Self {
        Self {
            orchestrator,
            hub,
            identity_header: identity_header.trim().to_ascii_lowercase(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analysis_routes())
        .merge(api::stream_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until `signal` resolves
///
/// Open progress streams are closed once the signal fires, otherwise the
/// graceful shutdown would wait on them forever.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub = Arc::clone(&state.hub);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            signal.await;
            hub.close_all();
        })
        .await
}
