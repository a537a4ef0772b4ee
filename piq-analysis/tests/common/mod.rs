//! Shared fixtures for piq-analysis integration tests
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use piq_analysis::collaborators::{
    AnalysisId, Evaluation, EvaluationError, Evaluator, NullClassifier, RecordId, ResultStore, Scores, StoreError,
};
use piq_analysis::github::models::{
    CommitAuthor, CommitDetail, CommitItem, IssueItem, PullRequestItem, RepositoryInfo, TreeEntry, TreeResponse,
};
use piq_analysis::github::GitHubError;
use piq_analysis::ingestion::{IngestionPipeline, RepositorySnapshot, RepositorySource};
use piq_analysis::lock::{LockEntry, LockError, LockManager, LockStore, MemoryLockStore};
use piq_analysis::orchestrator::{AnalysisServices, Orchestrator, WorkerPool};
use piq_analysis::progress::ProgressHub;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn repository_info(size_kb: u64) -> RepositoryInfo {
    RepositoryInfo {
        full_name: "octo/repo-A".to_string(),
        html_url: "https://github.com/octo/repo-A".to_string(),
        description: Some("Example repository".to_string()),
        language: Some("Rust".to_string()),
        created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        default_branch: Some("main".to_string()),
        size: size_kb,
        stargazers_count: 3,
        forks_count: 1,
    }
}

pub fn commit(sha: &str, message: &str, date: DateTime<Utc>) -> CommitItem {
    CommitItem {
        sha: sha.to_string(),
        commit: CommitDetail {
            message: message.to_string(),
            author: Some(CommitAuthor {
                name: Some("octo".to_string()),
                date: Some(date),
            }),
        },
    }
}

pub fn tree(paths: &[&str]) -> TreeResponse {
    TreeResponse {
        sha: "abc123".to_string(),
        tree: paths
            .iter()
            .map(|p| TreeEntry {
                path: p.to_string(),
                entry_type: "blob".to_string(),
                size: Some(10),
            })
            .collect(),
        truncated: false,
    }
}

/// Scriptable repository source with per-call counters
///
/// Every optional section defaults to a small successful payload. An
/// optional gate makes `repository` wait until the test adds a permit.
pub struct MockSource {
    pub info: Result<RepositoryInfo, GitHubError>,
    pub commits: Result<Vec<CommitItem>, GitHubError>,
    pub readme: Result<Option<String>, GitHubError>,
    pub tree: Result<Option<TreeResponse>, GitHubError>,
    pub issues: Result<Vec<IssueItem>, GitHubError>,
    pub pulls: Result<Vec<PullRequestItem>, GitHubError>,
    pub languages: Result<BTreeMap<String, u64>, GitHubError>,
    pub gate: Option<Arc<Semaphore>>,
    pub calls: AtomicUsize,
    pub tree_branch: Mutex<Option<String>>,
}

impl Default for MockSource {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert("Rust".to_string(), 12_000);
        Self {
            info: Ok(repository_info(500)),
            commits: Ok(vec![commit("c1", "Add parser", Utc::now())]),
            readme: Ok(Some("# Repo A\n\n## Usage\n".to_string())),
            tree: Ok(Some(tree(&["README.md", "src/lib.rs"]))),
            issues: Ok(Vec::new()),
            pulls: Ok(Vec::new()),
            languages: Ok(languages),
            gate: None,
            calls: AtomicUsize::new(0),
            tree_branch: Mutex::new(None),
        }
    }
}

impl MockSource {
    /// Every optional section answers 404
    pub fn all_optional_missing() -> Self {
        Self {
            commits: Err(GitHubError::NotFound),
            readme: Err(GitHubError::NotFound),
            tree: Err(GitHubError::NotFound),
            issues: Err(GitHubError::NotFound),
            pulls: Err(GitHubError::NotFound),
            languages: Err(GitHubError::NotFound),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RepositorySource for MockSource {
    async fn repository(&self, _owner: &str, _repo: &str) -> Result<RepositoryInfo, GitHubError> {
        self.hit();
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| GitHubError::Transport(e.to_string()))?;
        }
        self.info.clone()
    }

    async fn commits_since(
        &self,
        _owner: &str,
        _repo: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<CommitItem>, GitHubError> {
        self.hit();
        self.commits.clone()
    }

    async fn readme(&self, _owner: &str, _repo: &str) -> Result<Option<String>, GitHubError> {
        self.hit();
        self.readme.clone()
    }

    async fn tree(&self, _owner: &str, _repo: &str, branch: &str) -> Result<Option<TreeResponse>, GitHubError> {
        self.hit();
        *self.tree_branch.lock().unwrap() = Some(branch.to_string());
        self.tree.clone()
    }

    async fn issues_since(
        &self,
        _owner: &str,
        _repo: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<IssueItem>, GitHubError> {
        self.hit();
        self.issues.clone()
    }

    async fn pull_requests_since(
        &self,
        _owner: &str,
        _repo: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<PullRequestItem>, GitHubError> {
        self.hit();
        self.pulls.clone()
    }

    async fn languages(&self, _owner: &str, _repo: &str) -> Result<BTreeMap<String, u64>, GitHubError> {
        self.hit();
        self.languages.clone()
    }
}

/// Evaluator returning fixed scores, failing when `fail` is set and
/// panicking when `panics` is set
pub struct MockEvaluator {
    pub scores: Scores,
    pub fail: bool,
    pub panics: bool,
    pub calls: AtomicUsize,
}

impl MockEvaluator {
    pub fn with_scores(readme: u32, test: u32, commit: u32, cicd: u32) -> Self {
        Self {
            scores: Scores {
                readme,
                test,
                commit,
                cicd,
            },
            fail: false,
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_scores(0, 0, 0, 0)
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::with_scores(0, 0, 0, 0)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    async fn evaluate(&self, _snapshot: &RepositorySnapshot) -> Result<Evaluation, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("evaluator blew up");
        }
        if self.fail {
            return Err(EvaluationError::Upstream("model unavailable".to_string()));
        }
        Ok(Evaluation {
            summary: "Well structured".to_string(),
            strengths: vec!["Clear readme".to_string()],
            improvements: vec!["Add CI".to_string()],
            scores: self.scores,
        })
    }
}

/// In-memory result store with fixed ids
pub struct MockStore {
    pub record_id: RecordId,
    pub analysis_id: AnalysisId,
    pub saved: Mutex<Vec<(RecordId, Scores)>>,
    pub creates: AtomicUsize,
}

impl MockStore {
    pub fn new(record_id: RecordId, analysis_id: AnalysisId) -> Self {
        Self {
            record_id,
            analysis_id,
            saved: Mutex::new(Vec::new()),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl ResultStore for MockStore {
    async fn find_record(&self, _canonical_url: &str, _requester_id: i64) -> Result<Option<RecordId>, StoreError> {
        Ok(None)
    }

    async fn create_record(&self, _canonical_url: &str, _requester_id: i64) -> Result<RecordId, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.record_id)
    }

    async fn save(
        &self,
        record_id: RecordId,
        _snapshot: &RepositorySnapshot,
        evaluation: &Evaluation,
        _requester_id: i64,
    ) -> Result<AnalysisId, StoreError> {
        self.saved.lock().unwrap().push((record_id, evaluation.scores));
        Ok(self.analysis_id)
    }
}

/// Lock store wrapper counting calls into an inner memory store
#[derive(Default)]
pub struct CountingLockStore {
    inner: MemoryLockStore,
    pub acquires: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CountingLockStore {
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockStore for CountingLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.inner.try_acquire(key, holder, ttl).await
    }

    async fn refresh(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh(key, ttl).await
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(key).await
    }

    async fn entry(&self, key: &str) -> Result<Option<LockEntry>, LockError> {
        self.inner.entry(key).await
    }
}

/// Fully wired orchestrator over mocks, with handles to every mock
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub hub: Arc<ProgressHub>,
    pub source: Arc<MockSource>,
    pub evaluator: Arc<MockEvaluator>,
    pub store: Arc<MockStore>,
    pub locks: Arc<CountingLockStore>,
    pub lock_manager: LockManager,
}

impl Harness {
    pub fn new(source: MockSource, evaluator: MockEvaluator, store: MockStore) -> Self {
        Self::with_pool(source, evaluator, store, WorkerPool::new(4, 16))
    }

    pub fn with_pool(source: MockSource, evaluator: MockEvaluator, store: MockStore, pool: WorkerPool) -> Self {
        let hub = Arc::new(ProgressHub::default());
        let source = Arc::new(source);
        let evaluator = Arc::new(evaluator);
        let store = Arc::new(store);
        let locks = Arc::new(CountingLockStore::default());
        let lock_manager = LockManager::new(locks.clone(), Duration::from_secs(300));

        let services = AnalysisServices {
            locks: lock_manager.clone(),
            pipeline: IngestionPipeline::new(
                source.clone(),
                Arc::new(NullClassifier),
                Arc::clone(&hub),
                1_000_000,
            ),
            evaluator: evaluator.clone(),
            store: store.clone(),
            hub: Arc::clone(&hub),
        };

        Self {
            orchestrator: Arc::new(Orchestrator::new(services, pool)),
            hub,
            source,
            evaluator,
            store,
            locks,
            lock_manager,
        }
    }
}
