//! GitHub REST response types (only the fields the analysis reads)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RepositoryInfo {
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    /// Primary language as detected by GitHub
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub default_branch: Option<String>,
    /// Repository size in kilobytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}

/// Element of `GET /repos/{owner}/{repo}/commits`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CommitItem {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: String,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CommitAuthor {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TreeResponse {
    pub sha: String,
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TreeEntry {
    pub path: String,
    /// `blob` or `tree`
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: Option<u64>,
}

/// Element of `GET /repos/{owner}/{repo}/issues`
///
/// The issues endpoint also returns pull requests; those carry a
/// `pull_request` object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IssueItem {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
    pub pull_request: Option<serde_json::Value>,
}

impl IssueItem {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Element of `GET /repos/{owner}/{repo}/pulls`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PullRequestItem {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
}
