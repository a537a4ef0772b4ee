//! Bounded worker pool for analysis runs
//!
//! A fixed set of worker tasks drains a bounded backlog. Submission never
//! waits: a full backlog is reported to the caller.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub type Job = BoxFuture<'static, ()>;

pub const DEFAULT_WORKERS: usize = 16;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Worker pool backlog is full")]
    Full,

    #[error("Worker pool is shut down")]
    Closed,
}

pub struct WorkerPool {
    /// `None` once shut down
    tx: StdMutex<Option<mpsc::Sender<Job>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `workers` tasks sharing a backlog of `queue_capacity` jobs
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|index| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        // Only the receive is serialized; jobs run concurrently
                        let job = { rx.lock().await.recv().await };
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                    debug!(worker = index, "Analysis worker stopped");
                })
            })
            .collect();

        info!(workers, queue_capacity, "Analysis worker pool started");

        Self {
            tx: StdMutex::new(Some(tx)),
            workers: StdMutex::new(handles),
            worker_count: workers,
        }
    }

    /// Queue a job without waiting
    pub fn try_submit(&self, job: Job) -> Result<(), SubmitError> {
        let tx = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        let tx = tx.as_ref().ok_or(SubmitError::Closed)?;
        tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Free backlog slots (zero after shutdown)
    pub fn available_capacity(&self) -> usize {
        let tx = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        tx.as_ref().map(|tx| tx.capacity()).unwrap_or(0)
    }

    /// Stop accepting jobs and wait for queued ones to finish
    pub async fn shutdown(&self) {
        let tx = self.tx.lock().unwrap_or_else(|p| p.into_inner()).take();
        drop(tx);
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|p| p.into_inner()));
        for worker in workers {
            let _ = worker.await;
        }
        info!("Analysis worker pool drained");
    }
}
