//! Ingestion pipeline
//!
//! Sequential stages, one Status event per stage:
//! 1. Repository descriptor + size guard (hard-required)
//! 2. Commits (last 90 days)
//! 3. Readme
//! 4. File tree (security configuration)
//! 5. Test configuration (classifier)
//! 6. CI/CD configuration (classifier)
//! 7. Issues and pull requests (last 6 months)
//! 8. Languages
//!
//! Not-found on any optional stage resolves to empty/absent data; any other
//! client error aborts the pipeline with that error.

use super::snapshot::{
    CommitSummary, IssueSummary, PullRequestSummary, ReadmeSummary, RepositoryMetadata, RepositorySnapshot,
    RepositoryTree,
};
use super::source::RepositorySource;
use super::stage::StageOutcome;
use crate::collaborators::{FeatureFlags, TreeClassifier};
use crate::github::GitHubError;
use crate::progress::ProgressHub;
use chrono::{Duration, Months, Utc};
use piq_common::events::SubscriberId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default ceiling for repository size, in kilobytes
pub const DEFAULT_MAX_REPOSITORY_SIZE_KB: u64 = 1_000_000;
pub const COMMIT_WINDOW_DAYS: i64 = 90;
pub const COMMUNITY_WINDOW_MONTHS: u32 = 6;
const FALLBACK_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    #[error("Repository is too large: {size_kb} KB exceeds {limit_kb} KB")]
    TooLarge { size_kb: u64, limit_kb: u64 },

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Connecting,
    Commits,
    Documentation,
    Security,
    Tests,
    CiCd,
    Community,
    Languages,
}

impl IngestionStage {
    /// Status message shown to the subscriber when the stage starts
    pub fn message(&self) -> &'static str {
        match self {
            IngestionStage::Connecting => "Connecting to GitHub",
            IngestionStage::Commits => "Analyzing commit history",
            IngestionStage::Documentation => "Analyzing documentation",
            IngestionStage::Security => "Analyzing security configuration",
            IngestionStage::Tests => "Analyzing test configuration",
            IngestionStage::CiCd => "Analyzing CI/CD configuration",
            IngestionStage::Community => "Analyzing community activity",
            IngestionStage::Languages => "Analyzing languages",
        }
    }
}

pub struct IngestionPipeline {
    source: Arc<dyn RepositorySource>,
    classifier: Arc<dyn TreeClassifier>,
    hub: Arc<ProgressHub>,
    max_repository_size_kb: u64,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn RepositorySource>,
        classifier: Arc<dyn TreeClassifier>,
        hub: Arc<ProgressHub>,
        max_repository_size_kb: u64,
    ) -> Self {
        Self {
            source,
            classifier,
            hub,
            max_repository_size_kb,
        }
    }

    fn enter(&self, requester: SubscriberId, stage: IngestionStage) {
        debug!(requester, stage = ?stage, "Ingestion stage started");
        self.hub.status(requester, stage.message());
    }

    /// Collect every section of the snapshot for `owner/repo`
    pub async fn collect(
        &self,
        owner: &str,
        repo: &str,
        requester: SubscriberId,
    ) -> Result<RepositorySnapshot, IngestionError> {
        let now = Utc::now();

        self.enter(requester, IngestionStage::Connecting);
        let info = self.source.repository(owner, repo).await?;
        if info.size > self.max_repository_size_kb {
            warn!(
                repository = %info.full_name,
                size_kb = info.size,
                limit_kb = self.max_repository_size_kb,
                "Repository exceeds size limit"
            );
            return Err(IngestionError::TooLarge {
                size_kb: info.size,
                limit_kb: self.max_repository_size_kb,
            });
        }
        let metadata = RepositoryMetadata::from(info);

        self.enter(requester, IngestionStage::Commits);
        let since = now - Duration::days(COMMIT_WINDOW_DAYS);
        let commits = StageOutcome::from_result(self.source.commits_since(owner, repo, since).await).or_empty()?;
        let commits = CommitSummary::from_commits(&commits, now);

        self.enter(requester, IngestionStage::Documentation);
        let readme = StageOutcome::from_optional(self.source.readme(owner, repo).await)
            .into_option()?
            .and_then(|content| ReadmeSummary::from_content(&content));

        self.enter(requester, IngestionStage::Security);
        let branch = metadata
            .default_branch
            .clone()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string());
        let tree = StageOutcome::from_optional(self.source.tree(owner, repo, &branch).await)
            .into_option()?
            .and_then(RepositoryTree::from_response);

        self.enter(requester, IngestionStage::Tests);
        let features = match &tree {
            Some(tree) => self.classifier.classify(tree),
            None => FeatureFlags::default(),
        };
        self.enter(requester, IngestionStage::CiCd);

        self.enter(requester, IngestionStage::Community);
        let community_since = now
            .checked_sub_months(Months::new(COMMUNITY_WINDOW_MONTHS))
            .unwrap_or(now);
        let issues =
            StageOutcome::from_result(self.source.issues_since(owner, repo, community_since).await).or_empty()?;
        let pulls = StageOutcome::from_result(self.source.pull_requests_since(owner, repo, community_since).await)
            .or_empty()?;

        self.enter(requester, IngestionStage::Languages);
        let languages = StageOutcome::from_result(self.source.languages(owner, repo).await).or_empty()?;

        info!(
            repository = %metadata.full_name,
            commits = commits.count_last_90_days,
            has_readme = readme.is_some(),
            has_tree = tree.is_some(),
            issues = issues.len(),
            pull_requests = pulls.len(),
            "Repository data collected"
        );

        Ok(RepositorySnapshot {
            owner: owner.to_string(),
            repo: repo.to_string(),
            metadata,
            commits,
            readme,
            tree,
            features,
            issues: IssueSummary::from_issues(&issues),
            pull_requests: PullRequestSummary::from_pull_requests(&pulls),
            languages,
            collected_at: now,
        })
    }
}
