//! Repository data source
//!
//! [`RepositorySource`] is the pipeline's view of the remote API. The GitHub
//! implementation owns endpoint paths, query parameters and the post-fetch
//! filtering GitHub cannot do server-side (issue vs pull request, creation
//! window).

use crate::github::models::{CommitItem, IssueItem, PullRequestItem, RepositoryInfo, TreeResponse};
use crate::github::{GitHubClient, GitHubError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

const PAGE_SIZE: &str = "100";

#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo, GitHubError>;

    /// Commits authored since `since`, newest first
    async fn commits_since(&self, owner: &str, repo: &str, since: DateTime<Utc>) -> Result<Vec<CommitItem>, GitHubError>;

    /// Raw readme text; `None` when the repository has none
    async fn readme(&self, owner: &str, repo: &str) -> Result<Option<String>, GitHubError>;

    /// Recursive tree of `branch`; `None` when there is no tree
    async fn tree(&self, owner: &str, repo: &str, branch: &str) -> Result<Option<TreeResponse>, GitHubError>;

    /// Issues (pull requests excluded) created since `since`
    async fn issues_since(&self, owner: &str, repo: &str, since: DateTime<Utc>) -> Result<Vec<IssueItem>, GitHubError>;

    /// Pull requests created since `since`
    async fn pull_requests_since(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PullRequestItem>, GitHubError>;

    /// Language name to bytes of code
    async fn languages(&self, owner: &str, repo: &str) -> Result<BTreeMap<String, u64>, GitHubError>;
}

pub struct GitHubSource {
    client: Arc<GitHubClient>,
}

impl GitHubSource {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RepositorySource for GitHubSource {
    async fn repository(&self, owner: &str, repo: &str) -> Result<RepositoryInfo, GitHubError> {
        self.client.get(&format!("/repos/{}/{}", owner, repo), &[]).await
    }

    async fn commits_since(&self, owner: &str, repo: &str, since: DateTime<Utc>) -> Result<Vec<CommitItem>, GitHubError> {
        let query = [
            ("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        self.client
            .get_list(&format!("/repos/{}/{}/commits", owner, repo), &query)
            .await
    }

    async fn readme(&self, owner: &str, repo: &str) -> Result<Option<String>, GitHubError> {
        let content = self
            .client
            .get_raw(&format!("/repos/{}/{}/readme", owner, repo), &[])
            .await?;
        Ok(Some(content).filter(|c| !c.trim().is_empty()))
    }

    async fn tree(&self, owner: &str, repo: &str, branch: &str) -> Result<Option<TreeResponse>, GitHubError> {
        let query = [("recursive", "1".to_string())];
        let tree: TreeResponse = self
            .client
            .get(&format!("/repos/{}/{}/git/trees/{}", owner, repo, branch), &query)
            .await?;
        Ok(Some(tree).filter(|t| !t.tree.is_empty()))
    }

    async fn issues_since(&self, owner: &str, repo: &str, since: DateTime<Utc>) -> Result<Vec<IssueItem>, GitHubError> {
        let query = [("state", "all".to_string()), ("per_page", PAGE_SIZE.to_string())];
        let issues: Vec<IssueItem> = self
            .client
            .get_list(&format!("/repos/{}/{}/issues", owner, repo), &query)
            .await?;
        Ok(issues
            .into_iter()
            .filter(|i| !i.is_pull_request() && i.created_at >= since)
            .collect())
    }

    async fn pull_requests_since(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PullRequestItem>, GitHubError> {
        let query = [("state", "all".to_string()), ("per_page", PAGE_SIZE.to_string())];
        let pulls: Vec<PullRequestItem> = self
            .client
            .get_list(&format!("/repos/{}/{}/pulls", owner, repo), &query)
            .await?;
        Ok(pulls.into_iter().filter(|p| p.created_at >= since).collect())
    }

    async fn languages(&self, owner: &str, repo: &str) -> Result<BTreeMap<String, u64>, GitHubError> {
        self.client
            .get(&format!("/repos/{}/{}/languages", owner, repo), &[])
            .await
    }
}
