//! Single-process lock store

use super::{expiry_from_now, LockEntry, LockError, LockStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory lock store for single-process deployments and tests
///
/// The mutex is never held across an await, so a std mutex is sufficient.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    entries: Mutex<HashMap<String, LockEntry>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, LockEntry>>, LockError> {
        self.entries
            .lock()
            .map_err(|_| LockError::Unavailable("lock table mutex poisoned".to_string()))
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut entries = self.entries()?;
        let now = Utc::now();

        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(
            key.to_string(),
            LockEntry {
                key: key.to_string(),
                holder_token: holder.to_string(),
                expires_at: expiry_from_now(ttl),
            },
        );
        Ok(true)
    }

    async fn refresh(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut entries = self.entries()?;
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > Utc::now() => {
                entry.expires_at = expiry_from_now(ttl).max(entry.expires_at + chrono::Duration::milliseconds(1));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        self.entries()?.remove(key);
        Ok(())
    }

    async fn entry(&self, key: &str) -> Result<Option<LockEntry>, LockError> {
        let entries = self.entries()?;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Utc::now())
            .cloned())
    }
}
