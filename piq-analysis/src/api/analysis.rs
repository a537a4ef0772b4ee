//! Analysis request endpoint

use super::identity::AuthenticatedUser;
use crate::collaborators::RecordId;
use crate::error::ApiResult;
use crate::lock::LockManager;
use crate::target::RepositoryTarget;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub github_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub repository_id: RecordId,
}

/// POST /api/analysis
///
/// Validates the URL, takes the analysis lock and queues the run. Progress is
/// delivered on the caller's stream; the response only carries the record id.
pub async fn start_analysis(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let target = RepositoryTarget::parse(&request.github_url)?;
    let lock_key = LockManager::lock_key(user_id, &target.canonical_url);

    info!(user_id, repository = %target, "Analysis requested");

    let repository_id = state.orchestrator.dispatch(user_id, target, lock_key).await?;
    Ok(Json(AnalyzeResponse { repository_id }))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/api/analysis", post(start_analysis))
}
