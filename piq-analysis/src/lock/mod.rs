//! Distributed analysis lock
//!
//! At most one analysis per (requester, repository) may be in flight across
//! every request and every process sharing the lock store. Ownership is a
//! TTL-bounded [`LockEntry`] created by a single atomic check-and-set;
//! contention is reported as `Ok(false)`, never as an error.

mod memory;
mod sqlite;

pub use memory::MemoryLockStore;
pub use sqlite::SqliteLockStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Namespace prefix for every analysis lock key
pub const LOCK_PREFIX: &str = "analysis:lock:";

/// Default lock lifetime without refresh
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Lock store failures (store unreachable, query failed)
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock store database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lock store unavailable: {0}")]
    Unavailable(String),
}

/// Exclusive ownership of one logical resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub key: String,
    /// Diagnostic only, not a security credential
    pub holder_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Shared store backing the lock manager
///
/// Implementations must make `try_acquire` a single atomic check-and-set:
/// an entry is created iff no live entry exists for the key.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create the entry if the key is free (absent or expired)
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Push `expires_at` to now + ttl for a live entry; returns false if there was none
    async fn refresh(&self, key: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Delete the entry; absent keys are not an error
    async fn release(&self, key: &str) -> Result<(), LockError>;

    /// Current live entry, if any
    async fn entry(&self, key: &str) -> Result<Option<LockEntry>, LockError>;
}

/// Expiry instant for a TTL starting now
pub(crate) fn expiry_from_now(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
    Utc::now() + ttl
}

/// Lock manager used by the request path and the orchestrator
///
/// Keys passed in are logical keys (`"{requester}:{canonical_url}"`); the
/// manager adds [`LOCK_PREFIX`] before touching the store.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    ttl: Duration,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Logical lock key for one requester analysing one repository
    pub fn lock_key(requester_id: i64, canonical_url: &str) -> String {
        format!("{}:{}", requester_id, canonical_url)
    }

    fn store_key(key: &str) -> String {
        format!("{}{}", LOCK_PREFIX, key)
    }

    fn holder_token() -> String {
        let thread = std::thread::current();
        format!(
            "pid-{}:{}",
            std::process::id(),
            thread.name().unwrap_or("worker")
        )
    }

    /// Try to take the lock; `Ok(false)` means someone else holds it
    pub async fn try_acquire(&self, key: &str) -> Result<bool, LockError> {
        let store_key = Self::store_key(key);
        let holder = Self::holder_token();
        let acquired = self.store.try_acquire(&store_key, &holder, self.ttl).await?;

        if acquired {
            debug!(lock_key = %store_key, holder = %holder, "Analysis lock acquired");
        } else {
            warn!(lock_key = %store_key, "Duplicate analysis request blocked");
        }
        Ok(acquired)
    }

    /// Extend a live lock; expired or released locks are left alone
    pub async fn refresh(&self, key: &str) -> Result<(), LockError> {
        let store_key = Self::store_key(key);
        if !self.store.refresh(&store_key, self.ttl).await? {
            debug!(lock_key = %store_key, "Lock refresh skipped, no live entry");
        }
        Ok(())
    }

    /// Release unconditionally (idempotent)
    pub async fn release(&self, key: &str) -> Result<(), LockError> {
        let store_key = Self::store_key(key);
        self.store.release(&store_key).await?;
        debug!(lock_key = %store_key, "Analysis lock released");
        Ok(())
    }

    /// Expiry of the live entry, for diagnostics and tests
    pub async fn expires_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, LockError> {
        let entry = self.store.entry(&Self::store_key(key)).await?;
        Ok(entry.map(|e| e.expires_at))
    }
}
