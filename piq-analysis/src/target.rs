//! Repository target parsing
//!
//! Accepts `https://github.com/{owner}/{repo}` in the forms users paste
//! (trailing slash, `.git` suffix, deeper paths such as `/tree/main`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GITHUB_URL_PREFIX: &str = "https://github.com/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("Not a GitHub repository URL: {0}")]
    InvalidUrl(String),

    #[error("GitHub URL must name an owner and a repository: {0}")]
    InvalidPath(String),
}

/// Owner/repository pair plus its canonical URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryTarget {
    pub owner: String,
    pub repo: String,
    pub canonical_url: String,
}

impl RepositoryTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        let owner = owner.into();
        let repo = repo.into();
        let canonical_url = format!("{}{}/{}", GITHUB_URL_PREFIX, owner, repo);
        Self {
            owner,
            repo,
            canonical_url,
        }
    }

    /// Parse a user-supplied GitHub URL
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let trimmed = input.trim();
        let Some(path) = trimmed.strip_prefix(GITHUB_URL_PREFIX) else {
            return Err(TargetError::InvalidUrl(trimmed.to_string()));
        };

        let path = path.split(|c| c == '?' || c == '#').next().unwrap_or_default();
        let mut segments = path.trim_end_matches('/').split('/').map(str::trim);

        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if owner.is_empty() || repo.is_empty() {
            return Err(TargetError::InvalidPath(trimmed.to_string()));
        }

        Ok(Self::new(owner, repo))
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_url() {
        let target = RepositoryTarget::parse("https://github.com/octo/repo-A").unwrap();
        assert_eq!(target.owner, "octo");
        assert_eq!(target.repo, "repo-A");
        assert_eq!(target.canonical_url, "https://github.com/octo/repo-A");
        assert_eq!(target.full_name(), "octo/repo-A");
    }

    #[test]
    fn test_parse_normalizes_variants() {
        for input in [
            "  https://github.com/octo/repo-A/  ",
            "https://github.com/octo/repo-A.git",
            "https://github.com/octo/repo-A/tree/main/src",
            "https://github.com/octo/repo-A?tab=readme",
        ] {
            let target = RepositoryTarget::parse(input).unwrap();
            assert_eq!(target.canonical_url, "https://github.com/octo/repo-A", "input: {}", input);
        }
    }

    #[test]
    fn test_parse_rejects_other_hosts() {
        for input in [
            "http://github.com/octo/repo",
            "https://gitlab.com/octo/repo",
            "github.com/octo/repo",
            "",
        ] {
            assert!(matches!(
                RepositoryTarget::parse(input),
                Err(TargetError::InvalidUrl(_))
            ));
        }
    }

    #[test]
    fn test_parse_rejects_missing_segments() {
        for input in [
            "https://github.com/",
            "https://github.com/octo",
            "https://github.com/octo/",
            "https://github.com//repo",
            "https://github.com/octo/.git",
        ] {
            assert!(
                matches!(RepositoryTarget::parse(input), Err(TargetError::InvalidPath(_))),
                "input: {}",
                input
            );
        }
    }
}
