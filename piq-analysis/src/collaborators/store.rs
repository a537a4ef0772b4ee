//! Persistence seam for repository records and analysis results

use super::evaluator::{join_bullets, Evaluation};
use crate::ingestion::RepositorySnapshot;
use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;

/// Repository record identifier, returned to the requester before the run starts
pub type RecordId = i64;
/// Identifier of one stored analysis result
pub type AnalysisId = i64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Result store database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Result store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(RecordId),
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record previously created for this repository and requester
    async fn find_record(&self, canonical_url: &str, requester_id: i64) -> Result<Option<RecordId>, StoreError>;

    /// Create the record; must return the existing id on a concurrent duplicate
    async fn create_record(&self, canonical_url: &str, requester_id: i64) -> Result<RecordId, StoreError>;

    /// Store snapshot and evaluation against a record
    async fn save(
        &self,
        record_id: RecordId,
        snapshot: &RepositorySnapshot,
        evaluation: &Evaluation,
        requester_id: i64,
    ) -> Result<AnalysisId, StoreError>;
}

/// SQLite implementation over the shared service database
#[derive(Debug, Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn find_record(&self, canonical_url: &str, requester_id: i64) -> Result<Option<RecordId>, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM repositories WHERE html_url = ? AND requester_id = ?")
                .bind(canonical_url)
                .bind(requester_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn create_record(&self, canonical_url: &str, requester_id: i64) -> Result<RecordId, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO repositories (html_url, requester_id)
            VALUES (?, ?)
            ON CONFLICT(html_url, requester_id) DO UPDATE SET updated_at = datetime('now')
            RETURNING id
            "#,
        )
        .bind(canonical_url)
        .bind(requester_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn save(
        &self,
        record_id: RecordId,
        snapshot: &RepositorySnapshot,
        evaluation: &Evaluation,
        requester_id: i64,
    ) -> Result<AnalysisId, StoreError> {
        let snapshot_json = serde_json::to_string(snapshot)?;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE repositories
            SET full_name = ?, description = ?, language = ?, snapshot = ?, updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(&snapshot.metadata.full_name)
        .bind(&snapshot.metadata.description)
        .bind(&snapshot.metadata.language)
        .bind(&snapshot_json)
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(record_id));
        }

        let scores = evaluation.scores;
        let inserted = sqlx::query(
            r#"
            INSERT INTO analysis_results (
                repository_id, requester_id, summary, strengths, improvements,
                readme_score, test_score, commit_score, cicd_score, total_score
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record_id)
        .bind(requester_id)
        .bind(evaluation.summary.trim())
        .bind(join_bullets(&evaluation.strengths))
        .bind(join_bullets(&evaluation.improvements))
        .bind(scores.readme as i64)
        .bind(scores.test as i64)
        .bind(scores.commit as i64)
        .bind(scores.cicd as i64)
        .bind(scores.total() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let analysis_id = inserted.last_insert_rowid();
        tracing::info!(record_id, analysis_id, "Analysis result saved");
        Ok(analysis_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FeatureFlags, Scores};
    use crate::ingestion::{CommitSummary, IssueSummary, PullRequestSummary, RepositoryMetadata};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const URL: &str = "https://github.com/octo/repo-A";

    async fn store(dir: &TempDir) -> SqliteResultStore {
        let pool = piq_common::db::init_database(&dir.path().join("results.db"))
            .await
            .unwrap();
        SqliteResultStore::new(pool)
    }

    fn snapshot() -> RepositorySnapshot {
        RepositorySnapshot {
            owner: "octo".to_string(),
            repo: "repo-A".to_string(),
            metadata: RepositoryMetadata {
                full_name: "octo/repo-A".to_string(),
                html_url: URL.to_string(),
                description: Some("Sample".to_string()),
                language: Some("Rust".to_string()),
                created_at: Utc::now(),
                default_branch: Some("main".to_string()),
                size_kb: 512,
                stars: 3,
                forks: 1,
            },
            commits: CommitSummary::default(),
            readme: None,
            tree: None,
            features: FeatureFlags::default(),
            issues: IssueSummary::default(),
            pull_requests: PullRequestSummary::default(),
            languages: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    fn evaluation() -> Evaluation {
        Evaluation {
            summary: "  Solid project  ".to_string(),
            strengths: vec!["Clear readme".to_string()],
            improvements: vec![],
            scores: Scores {
                readme: 20,
                test: 18,
                commit: 15,
                cicd: 5,
            },
        }
    }

    async fn result_count(store: &SqliteResultStore) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analysis_results")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_create_record_is_idempotent_per_requester() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let first = store.create_record(URL, 42).await.unwrap();
        let second = store.create_record(URL, 42).await.unwrap();
        assert_eq!(first, second);

        assert_eq!(store.find_record(URL, 42).await.unwrap(), Some(first));
        assert_eq!(store.find_record(URL, 7).await.unwrap(), None);

        let other = store.create_record(URL, 7).await.unwrap();
        assert_ne!(other, first);
    }

    #[tokio::test]
    async fn test_save_to_missing_record_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let err = store.save(999, &snapshot(), &evaluation(), 42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(999)));
        assert_eq!(result_count(&store).await, 0);
    }

    #[tokio::test]
    async fn test_save_stores_result_with_total() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;
        let record_id = store.create_record(URL, 42).await.unwrap();

        let analysis_id = store.save(record_id, &snapshot(), &evaluation(), 42).await.unwrap();

        let (repository_id, summary, total): (i64, String, i64) = sqlx::query_as(
            "SELECT repository_id, summary, total_score FROM analysis_results WHERE id = ?",
        )
        .bind(analysis_id)
        .fetch_one(&store.pool)
        .await
        .unwrap();
        assert_eq!(repository_id, record_id);
        assert_eq!(summary, "Solid project");
        assert_eq!(total, 58);

        let (full_name,): (Option<String>,) = sqlx::query_as("SELECT full_name FROM repositories WHERE id = ?")
            .bind(record_id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(full_name.as_deref(), Some("octo/repo-A"));
    }
}
