//! Analysis orchestrator
//!
//! `dispatch` runs on the request path: it takes the analysis lock, resolves
//! the record id and queues the run on the worker pool, returning the id
//! before any stage executes. The run itself (see [`run`]) reports progress
//! through the hub and always releases the lock when it ends.

pub mod pool;
pub mod run;
pub mod state;

pub use pool::{SubmitError, WorkerPool, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
pub use run::{PipelineRun, RunError};
pub use state::{RunState, StateTransition};

use crate::collaborators::{Evaluator, RecordId, ResultStore, StoreError};
use crate::ingestion::IngestionPipeline;
use crate::lock::{LockError, LockManager};
use crate::progress::ProgressHub;
use crate::target::RepositoryTarget;
use futures::FutureExt;
use piq_common::events::SubscriberId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Another run holds the lock for this key
    #[error("Analysis already in progress")]
    AlreadyRunning,

    #[error("Lock store failure: {0}")]
    Lock(#[from] LockError),

    #[error("Record lookup failed: {0}")]
    Store(#[from] StoreError),

    /// Worker backlog is full
    #[error("Analysis queue is full")]
    Saturated,

    #[error("Analysis service is shutting down")]
    ShuttingDown,
}

/// Everything a run needs, shared by all workers
pub struct AnalysisServices {
    pub locks: LockManager,
    pub pipeline: IngestionPipeline,
    pub evaluator: Arc<dyn Evaluator>,
    pub store: Arc<dyn ResultStore>,
    pub hub: Arc<ProgressHub>,
}

pub struct Orchestrator {
    services: Arc<AnalysisServices>,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(services: AnalysisServices, pool: WorkerPool) -> Self {
        Self {
            services: Arc::new(services),
            pool,
        }
    }

    pub fn services(&self) -> &AnalysisServices {
        &self.services
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Start an analysis of `target` for `requester`
    ///
    /// Returns the repository record id. `AlreadyRunning` has no side effects.
    pub async fn dispatch(
        &self,
        requester: SubscriberId,
        target: RepositoryTarget,
        lock_key: String,
    ) -> Result<RecordId, DispatchError> {
        if !self.services.locks.try_acquire(&lock_key).await? {
            return Err(DispatchError::AlreadyRunning);
        }

        let record_id = match self.resolve_record(&target, requester).await {
            Ok(id) => id,
            Err(e) => {
                self.release_after_failed_dispatch(&lock_key).await;
                return Err(e.into());
            }
        };

        let run = PipelineRun::new(requester, target, lock_key.clone(), record_id);
        let run_id = run.run_id;
        let services = Arc::clone(&self.services);
        let job = async move { run::execute(&services, run).await }.boxed();

        if let Err(e) = self.pool.try_submit(job) {
            warn!(lock_key = %lock_key, error = %e, "Analysis run rejected by worker pool");
            // Only the lock is undone; the record stays and a retry resolves to the same id
            self.release_after_failed_dispatch(&lock_key).await;
            return Err(match e {
                SubmitError::Full => DispatchError::Saturated,
                SubmitError::Closed => DispatchError::ShuttingDown,
            });
        }

        info!(%run_id, requester, record_id, "Analysis run queued");
        Ok(record_id)
    }

    async fn resolve_record(&self, target: &RepositoryTarget, requester: SubscriberId) -> Result<RecordId, StoreError> {
        let store = &self.services.store;
        match store.find_record(&target.canonical_url, requester).await? {
            Some(id) => Ok(id),
            None => store.create_record(&target.canonical_url, requester).await,
        }
    }

    async fn release_after_failed_dispatch(&self, lock_key: &str) {
        if let Err(e) = self.services.locks.release(lock_key).await {
            warn!(lock_key, error = %e, "Lock release after failed dispatch failed, entry will expire");
        }
    }

    /// Stop accepting runs and wait for queued and in-flight runs to finish
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
