//! Aggregate repository snapshot
//!
//! One record per analysed repository. Every sub-section is independently
//! optional or possibly empty; partial data is a valid outcome.

use crate::collaborators::FeatureFlags;
use crate::github::models::{CommitItem, IssueItem, PullRequestItem, RepositoryInfo, TreeResponse};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many recent commits/issues/pull requests are kept verbatim
pub const RECENT_ITEM_LIMIT: usize = 10;

const MAX_COMMIT_MESSAGE_LEN: usize = 100;
const TRUNCATED_COMMIT_MESSAGE_LEN: usize = 97;
const EMPTY_COMMIT_MESSAGE: &str = "No commit message";

static MARKDOWN_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("static regex is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub owner: String,
    pub repo: String,
    pub metadata: RepositoryMetadata,
    pub commits: CommitSummary,
    pub readme: Option<ReadmeSummary>,
    pub tree: Option<RepositoryTree>,
    pub features: FeatureFlags,
    pub issues: IssueSummary,
    pub pull_requests: PullRequestSummary,
    /// Language name to bytes of code
    pub languages: BTreeMap<String, u64>,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub default_branch: Option<String>,
    pub size_kb: u64,
    pub stars: u64,
    pub forks: u64,
}

impl From<RepositoryInfo> for RepositoryMetadata {
    fn from(info: RepositoryInfo) -> Self {
        Self {
            full_name: info.full_name,
            html_url: info.html_url,
            description: info.description,
            language: info.language,
            created_at: info.created_at,
            default_branch: info.default_branch,
            size_kb: info.size,
            stars: info.stargazers_count,
            forks: info.forks_count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub last_commit_date: Option<DateTime<Utc>>,
    pub days_since_last_commit: Option<i64>,
    pub count_last_90_days: usize,
    pub recent: Vec<CommitSnippet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSnippet {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl CommitSummary {
    /// Summarize commits as returned by GitHub (newest first)
    pub fn from_commits(commits: &[CommitItem], now: DateTime<Utc>) -> Self {
        let last_commit_date = commits
            .iter()
            .filter_map(|c| c.commit.author.as_ref().and_then(|a| a.date))
            .max();

        let recent = commits
            .iter()
            .take(RECENT_ITEM_LIMIT)
            .map(|c| CommitSnippet {
                sha: c.sha.clone(),
                message: clean_commit_message(&c.commit.message),
                author: c.commit.author.as_ref().and_then(|a| a.name.clone()),
                date: c.commit.author.as_ref().and_then(|a| a.date),
            })
            .collect();

        Self {
            last_commit_date,
            days_since_last_commit: last_commit_date.map(|d| (now - d).num_days().max(0)),
            count_last_90_days: commits.len(),
            recent,
        }
    }
}

/// First line of a commit message, trimmed and capped at 100 characters
pub fn clean_commit_message(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return EMPTY_COMMIT_MESSAGE.to_string();
    }

    if first_line.chars().count() > MAX_COMMIT_MESSAGE_LEN {
        let truncated: String = first_line.chars().take(TRUNCATED_COMMIT_MESSAGE_LEN).collect();
        format!("{}...", truncated)
    } else {
        first_line.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadmeSummary {
    pub length: usize,
    pub section_titles: Vec<String>,
    pub content: String,
}

impl ReadmeSummary {
    /// Blank content counts as no readme
    pub fn from_content(content: &str) -> Option<Self> {
        if content.trim().is_empty() {
            return None;
        }
        Some(Self {
            length: content.chars().count(),
            section_titles: section_titles(content),
            content: content.to_string(),
        })
    }
}

/// ATX markdown headers outside fenced code blocks
pub fn section_titles(markdown: &str) -> Vec<String> {
    let mut in_fence = false;
    let mut titles = Vec::new();

    for line in markdown.lines() {
        let line = line.trim_end();
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = MARKDOWN_HEADER.captures(line) {
            let title = caps[2].trim().trim_end_matches('#').trim();
            if !title.is_empty() {
                titles.push(title.to_string());
            }
        }
    }

    titles
}

/// Flattened recursive file tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryTree {
    pub sha: String,
    /// Blob paths only, in API order
    pub paths: Vec<String>,
    pub truncated: bool,
}

impl RepositoryTree {
    /// An empty tree counts as no tree
    pub fn from_response(response: TreeResponse) -> Option<Self> {
        let paths: Vec<String> = response
            .tree
            .into_iter()
            .filter(|e| e.entry_type == "blob")
            .map(|e| e.path)
            .collect();

        if paths.is_empty() {
            return None;
        }
        Some(Self {
            sha: response.sha,
            paths,
            truncated: response.truncated,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total: usize,
    pub closed: usize,
    pub recent: Vec<IssueSnippet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSnippet {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

impl IssueSummary {
    pub fn from_issues(issues: &[IssueItem]) -> Self {
        let mut recent: Vec<IssueSnippet> = issues
            .iter()
            .map(|i| IssueSnippet {
                number: i.number,
                title: i.title.clone(),
                state: i.state.clone(),
                created_at: i.created_at,
            })
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(RECENT_ITEM_LIMIT);

        Self {
            total: issues.len(),
            closed: issues.iter().filter(|i| i.state == "closed").count(),
            recent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub total: usize,
    pub merged: usize,
    pub recent: Vec<PullRequestSnippet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSnippet {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub merged: bool,
}

impl PullRequestSummary {
    pub fn from_pull_requests(pulls: &[PullRequestItem]) -> Self {
        let mut recent: Vec<PullRequestSnippet> = pulls
            .iter()
            .map(|p| PullRequestSnippet {
                number: p.number,
                title: p.title.clone(),
                state: p.state.clone(),
                created_at: p.created_at,
                merged: p.merged_at.is_some(),
            })
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(RECENT_ITEM_LIMIT);

        Self {
            total: pulls.len(),
            merged: pulls.iter().filter(|p| p.merged_at.is_some()).count(),
            recent,
        }
    }
}
