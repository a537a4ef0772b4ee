//! SQLite-backed lock store
//!
//! Every process on the host opens the same database file, so the table acts
//! as the shared key/value store. Acquisition is one upsert statement whose
//! update branch only fires when the existing row has expired; the affected
//! row count tells us whether we won.

use super::{expiry_from_now, LockEntry, LockError, LockStore};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SqliteLockStore {
    pool: SqlitePool,
}

impl SqliteLockStore {
    /// Wrap a pool whose schema was created by `piq_common::db::init_database`
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl LockStore for SqliteLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = now_ms();
        let expires_at = expiry_from_now(ttl).timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO analysis_locks (lock_key, holder, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(lock_key) DO UPDATE
                SET holder = excluded.holder,
                    expires_at = excluded.expires_at
                WHERE analysis_locks.expires_at <= ?4
            "#,
        )
        .bind(key)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn refresh(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let expires_at = expiry_from_now(ttl).timestamp_millis();

        // Strictly later than before, even within the same millisecond
        let result = sqlx::query(
            "UPDATE analysis_locks SET expires_at = MAX(expires_at + 1, ?1) WHERE lock_key = ?2 AND expires_at > ?3",
        )
        .bind(expires_at)
        .bind(key)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        sqlx::query("DELETE FROM analysis_locks WHERE lock_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn entry(&self, key: &str) -> Result<Option<LockEntry>, LockError> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT lock_key, holder, expires_at FROM analysis_locks WHERE lock_key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(key, holder_token, expires_ms)| {
            Utc.timestamp_millis_opt(expires_ms)
                .single()
                .map(|expires_at| LockEntry {
                    key,
                    holder_token,
                    expires_at,
                })
        }))
    }
}
