//! One analysis run, executed on a pool worker

use super::state::{RunState, StateTransition};
use super::AnalysisServices;
use crate::collaborators::{AnalysisId, EvaluationError, RecordId, StoreError};
use crate::github::GitHubError;
use crate::ingestion::IngestionError;
use crate::lock::LockError;
use crate::target::RepositoryTarget;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use piq_common::events::SubscriberId;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MSG_STARTED: &str = "Analysis started";
pub const MSG_COLLECTED: &str = "GitHub data collected";
pub const MSG_EVALUATED: &str = "AI evaluation completed";

pub const MSG_NOT_FOUND: &str = "Repository not found";
pub const MSG_RATE_LIMITED: &str = "GitHub API rate limit exceeded, please try again later";
pub const MSG_INVALID_CREDENTIALS: &str = "GitHub credentials are invalid";
pub const MSG_FORBIDDEN: &str = "Access to the repository is forbidden";
pub const MSG_TOO_LARGE: &str = "Repository is too large to analyze";
pub const MSG_ANALYSIS_FAILED: &str = "Analysis failed";
pub const MSG_INTERNAL: &str = "Analysis failed due to an internal error";

/// Why a run aborted
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("Lock refresh failed: {0}")]
    Lock(#[from] LockError),

    #[error("Illegal state transition {from:?} -> {to:?}")]
    IllegalTransition { from: RunState, to: RunState },
}

impl RunError {
    /// Short message for the subscriber's Error event
    pub fn user_message(&self) -> &'static str {
        match self {
            RunError::Ingestion(IngestionError::TooLarge { .. }) => MSG_TOO_LARGE,
            RunError::Ingestion(IngestionError::GitHub(err)) => match err {
                GitHubError::NotFound => MSG_NOT_FOUND,
                GitHubError::RateLimited => MSG_RATE_LIMITED,
                GitHubError::InvalidCredentials => MSG_INVALID_CREDENTIALS,
                GitHubError::Forbidden => MSG_FORBIDDEN,
                _ => MSG_INTERNAL,
            },
            RunError::Evaluation(_) => MSG_ANALYSIS_FAILED,
            RunError::Store(_) | RunError::Lock(_) | RunError::IllegalTransition { .. } => MSG_INTERNAL,
        }
    }
}

/// Per-invocation execution context, owned by exactly one run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub subscriber_id: SubscriberId,
    pub target: RepositoryTarget,
    pub lock_key: String,
    pub record_id: RecordId,
    /// Number of transitions taken so far
    pub stage_index: usize,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(subscriber_id: SubscriberId, target: RepositoryTarget, lock_key: String, record_id: RecordId) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            subscriber_id,
            target,
            lock_key,
            record_id,
            stage_index: 0,
            state: RunState::Starting,
            started_at: Utc::now(),
        }
    }

    /// Move to `next` if legal
    pub fn transition_to(&mut self, next: RunState) -> Result<StateTransition, RunError> {
        if !self.state.can_transition_to(next) {
            return Err(RunError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state: next,
            transitioned_at: Utc::now(),
        };
        self.state = next;
        self.stage_index += 1;
        Ok(transition)
    }
}

/// Refresh the lock, then transition
async fn advance(services: &AnalysisServices, run: &mut PipelineRun, next: RunState) -> Result<(), RunError> {
    services.locks.refresh(&run.lock_key).await?;
    let transition = run.transition_to(next)?;
    tracing::debug!(
        run_id = %transition.run_id,
        from = ?transition.old_state,
        to = ?transition.new_state,
        "Analysis run transition"
    );
    Ok(())
}

async fn drive(services: &AnalysisServices, run: &mut PipelineRun) -> Result<AnalysisId, RunError> {
    let subscriber = run.subscriber_id;
    services.hub.status(subscriber, MSG_STARTED);

    advance(services, run, RunState::Ingesting).await?;
    let snapshot = services
        .pipeline
        .collect(&run.target.owner, &run.target.repo, subscriber)
        .await?;
    services.hub.status(subscriber, MSG_COLLECTED);

    advance(services, run, RunState::Evaluating).await?;
    let evaluation = services.evaluator.evaluate(&snapshot).await?;
    services.hub.status(subscriber, MSG_EVALUATED);

    advance(services, run, RunState::Persisting).await?;
    let analysis_id = services
        .store
        .save(run.record_id, &snapshot, &evaluation, subscriber)
        .await?;

    advance(services, run, RunState::Completed).await?;
    services.hub.complete_event(subscriber, analysis_id.to_string());

    Ok(analysis_id)
}

/// Move to Aborting and publish the single Error event
async fn abort(services: &AnalysisServices, run: &mut PipelineRun, message: &str) {
    if let Err(e) = services.locks.refresh(&run.lock_key).await {
        warn!(run_id = %run.run_id, error = %e, "Lock refresh before abort failed");
    }
    if run.transition_to(RunState::Aborting).is_err() {
        // Failure after a terminal state (e.g. panic after Completed)
        run.state = RunState::Aborting;
    }
    services.hub.error(run.subscriber_id, message);
}

/// Execute a run to a terminal state; always releases the lock
pub(crate) async fn execute(services: &AnalysisServices, mut run: PipelineRun) {
    info!(
        run_id = %run.run_id,
        repository = %run.target,
        requester = run.subscriber_id,
        record_id = run.record_id,
        "Analysis run started"
    );

    let outcome = AssertUnwindSafe(drive(services, &mut run)).catch_unwind().await;

    match outcome {
        Ok(Ok(analysis_id)) => {
            info!(
                run_id = %run.run_id,
                analysis_id,
                elapsed_ms = (Utc::now() - run.started_at).num_milliseconds(),
                "Analysis run completed"
            );
        }
        Ok(Err(err)) => {
            match &err {
                RunError::Ingestion(IngestionError::TooLarge { .. })
                | RunError::Ingestion(IngestionError::GitHub(GitHubError::NotFound)) => {
                    warn!(run_id = %run.run_id, state = ?run.state, error = %err, "Analysis run aborted")
                }
                _ => error!(run_id = %run.run_id, state = ?run.state, error = %err, "Analysis run aborted"),
            }
            abort(services, &mut run, err.user_message()).await;
        }
        Err(_) => {
            error!(run_id = %run.run_id, state = ?run.state, "Analysis run panicked");
            abort(services, &mut run, MSG_INTERNAL).await;
        }
    }

    if let Err(e) = services.locks.release(&run.lock_key).await {
        warn!(run_id = %run.run_id, lock_key = %run.lock_key, error = %e, "Lock release failed, entry will expire");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> PipelineRun {
        PipelineRun::new(42, RepositoryTarget::new("octo", "repo-A"), "42:x".to_string(), 7)
    }

    #[test]
    fn test_transition_counts_stages() {
        let mut run = run();
        run.transition_to(RunState::Ingesting).unwrap();
        run.transition_to(RunState::Evaluating).unwrap();
        assert_eq!(run.stage_index, 2);
        assert_eq!(run.state, RunState::Evaluating);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut run = run();
        let err = run.transition_to(RunState::Completed).unwrap_err();
        assert!(matches!(err, RunError::IllegalTransition { .. }));
        assert_eq!(run.state, RunState::Starting);
    }

    #[test]
    fn test_user_messages() {
        let too_large = RunError::Ingestion(IngestionError::TooLarge { size_kb: 2, limit_kb: 1 });
        assert_eq!(too_large.user_message(), MSG_TOO_LARGE);

        let rate = RunError::Ingestion(IngestionError::GitHub(GitHubError::RateLimited));
        assert_eq!(rate.user_message(), MSG_RATE_LIMITED);

        let missing = RunError::Ingestion(IngestionError::GitHub(GitHubError::NotFound));
        assert_eq!(missing.user_message(), MSG_NOT_FOUND);

        let server = RunError::Ingestion(IngestionError::GitHub(GitHubError::Server(502)));
        assert_eq!(server.user_message(), MSG_INTERNAL);

        let eval = RunError::Evaluation(EvaluationError::Upstream("timeout".into()));
        assert_eq!(eval.user_message(), MSG_ANALYSIS_FAILED);
    }
}
