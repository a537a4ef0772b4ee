//! Database initialization
//!
//! Opens (or creates) the shared SQLite file used for the analysis lock table
//! and the analysis result records. Multiple service processes on one host
//! share the same file, so WAL mode and a busy timeout are always enabled.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent, safe to call multiple times)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    create_analysis_locks_table(pool).await?;
    create_repositories_table(pool).await?;
    create_analysis_results_table(pool).await?;
    Ok(())
}

async fn create_analysis_locks_table(pool: &SqlitePool) -> Result<()> {
    // expires_at is unix epoch milliseconds
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_locks (
            lock_key TEXT PRIMARY KEY,
            holder TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_repositories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            html_url TEXT NOT NULL,
            requester_id INTEGER NOT NULL,
            full_name TEXT,
            description TEXT,
            language TEXT,
            snapshot TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (html_url, requester_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_analysis_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository_id INTEGER NOT NULL REFERENCES repositories(id),
            requester_id INTEGER NOT NULL,
            summary TEXT NOT NULL,
            strengths TEXT NOT NULL,
            improvements TEXT NOT NULL,
            readme_score INTEGER NOT NULL,
            test_score INTEGER NOT NULL,
            commit_score INTEGER NOT NULL,
            cicd_score INTEGER NOT NULL,
            total_score INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
