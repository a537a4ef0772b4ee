//! Ingestion pipeline tests over a scripted repository source

mod common;

use common::{commit, repository_info, tree, MockSource};
use piq_analysis::collaborators::{FeatureFlags, TreeClassifier};
use piq_analysis::github::GitHubError;
use piq_analysis::ingestion::{IngestionError, IngestionPipeline, IngestionStage, RepositoryTree};
use piq_analysis::progress::ProgressHub;
use piq_common::events::ProgressEventKind;
use std::sync::Arc;
use std::time::Duration;

const USER: i64 = 42;

/// Flags CI when a workflow file is present
struct WorkflowClassifier;

impl TreeClassifier for WorkflowClassifier {
    fn classify(&self, tree: &RepositoryTree) -> FeatureFlags {
        let evidence: Vec<String> = tree
            .paths
            .iter()
            .filter(|p| p.starts_with(".github/workflows/"))
            .cloned()
            .collect();
        FeatureFlags {
            has_ci_cd: !evidence.is_empty(),
            evidence,
            ..FeatureFlags::default()
        }
    }
}

fn pipeline(source: Arc<MockSource>, hub: Arc<ProgressHub>, max_kb: u64) -> IngestionPipeline {
    IngestionPipeline::new(source, Arc::new(WorkflowClassifier), hub, max_kb)
}

#[tokio::test]
async fn test_collects_every_section() {
    let source = Arc::new(MockSource {
        commits: Ok(vec![
            commit("c2", "Fix bug\n\nlong body", chrono::Utc::now()),
            commit("c1", "", chrono::Utc::now() - chrono::Duration::days(3)),
        ]),
        tree: Ok(Some(tree(&["README.md", ".github/workflows/ci.yml"]))),
        ..MockSource::default()
    });
    let hub = Arc::new(ProgressHub::default());

    let snapshot = pipeline(source.clone(), hub, 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap();

    assert_eq!(snapshot.owner, "octo");
    assert_eq!(snapshot.metadata.full_name, "octo/repo-A");
    assert_eq!(snapshot.commits.count_last_90_days, 2);
    assert!(snapshot.readme.is_some());
    assert_eq!(snapshot.tree.as_ref().unwrap().paths.len(), 2);
    assert!(snapshot.features.has_ci_cd);
    assert_eq!(snapshot.languages.get("Rust"), Some(&12_000));
    assert_eq!(source.tree_branch.lock().unwrap().as_deref(), Some("main"));
    assert_eq!(source.call_count(), 7);
}

#[tokio::test]
async fn test_missing_optional_sections_resolve_to_empty() {
    let source = Arc::new(MockSource::all_optional_missing());
    let hub = Arc::new(ProgressHub::default());

    let snapshot = pipeline(source, hub, 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap();

    assert_eq!(snapshot.commits.count_last_90_days, 0);
    assert!(snapshot.readme.is_none());
    assert!(snapshot.tree.is_none());
    assert_eq!(snapshot.features, FeatureFlags::default());
    assert_eq!(snapshot.issues.total, 0);
    assert_eq!(snapshot.pull_requests.total, 0);
    assert!(snapshot.languages.is_empty());
}

#[tokio::test]
async fn test_missing_repository_is_fatal() {
    let source = Arc::new(MockSource {
        info: Err(GitHubError::NotFound),
        ..MockSource::default()
    });
    let hub = Arc::new(ProgressHub::default());

    let err = pipeline(source.clone(), hub, 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap_err();

    assert_eq!(err, IngestionError::GitHub(GitHubError::NotFound));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_size_guard_stops_before_other_fetches() {
    let source = Arc::new(MockSource {
        info: Ok(repository_info(2_000_000)),
        ..MockSource::default()
    });
    let hub = Arc::new(ProgressHub::default());

    let err = pipeline(source.clone(), hub, 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IngestionError::TooLarge {
            size_kb: 2_000_000,
            limit_kb: 1_000_000
        }
    );
    assert_eq!(source.call_count(), 1, "no fetch may follow the size guard");
}

#[tokio::test]
async fn test_non_not_found_error_aborts_pipeline() {
    let source = Arc::new(MockSource {
        readme: Err(GitHubError::RateLimited),
        ..MockSource::default()
    });
    let hub = Arc::new(ProgressHub::default());

    let err = pipeline(source.clone(), hub, 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap_err();

    assert_eq!(err, IngestionError::GitHub(GitHubError::RateLimited));
    // repository, commits, readme
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_blank_default_branch_falls_back_to_main() {
    let mut info = repository_info(10);
    info.default_branch = Some("  ".to_string());
    let source = Arc::new(MockSource {
        info: Ok(info),
        ..MockSource::default()
    });

    pipeline(source.clone(), Arc::new(ProgressHub::default()), 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap();
    assert_eq!(source.tree_branch.lock().unwrap().as_deref(), Some("main"));
}

#[tokio::test]
async fn test_stage_status_events_in_order() {
    let hub = Arc::new(ProgressHub::new(Duration::from_secs(60)));
    let mut channel = hub.subscribe(USER, USER).unwrap();
    let source = Arc::new(MockSource::default());

    pipeline(source, hub.clone(), 1_000_000)
        .collect("octo", "repo-A", USER)
        .await
        .unwrap();

    let connected = channel.try_recv().unwrap();
    assert_eq!(connected.kind, ProgressEventKind::Connected);

    let mut messages = Vec::new();
    while let Some(event) = channel.try_recv() {
        assert_eq!(event.kind, ProgressEventKind::Status);
        messages.push(event.payload);
    }

    let expected: Vec<String> = [
        IngestionStage::Connecting,
        IngestionStage::Commits,
        IngestionStage::Documentation,
        IngestionStage::Security,
        IngestionStage::Tests,
        IngestionStage::CiCd,
        IngestionStage::Community,
        IngestionStage::Languages,
    ]
    .iter()
    .map(|s| s.message().to_string())
    .collect();
    assert_eq!(messages, expected);
}
