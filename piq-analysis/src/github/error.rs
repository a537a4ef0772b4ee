//! GitHub client error taxonomy
//!
//! Callers branch on these variants, never on raw status codes.

use super::rate_limit::remaining_quota;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitHubError {
    #[error("GitHub resource not found")]
    NotFound,

    #[error("GitHub access forbidden")]
    Forbidden,

    #[error("GitHub credentials are invalid")]
    InvalidCredentials,

    #[error("GitHub rate limit exceeded")]
    RateLimited,

    #[error("GitHub client error {0}")]
    Client(u16),

    #[error("GitHub server error {0}")]
    Server(u16),

    #[error("GitHub response parse error: {0}")]
    Parse(String),

    /// Connection, timeout or body read failure
    #[error("GitHub transport error: {0}")]
    Transport(String),
}

impl GitHubError {
    /// Map a non-success status to the taxonomy
    ///
    /// A 403 with an exhausted quota is GitHub's primary rate-limit signal and
    /// is reported as `RateLimited`, not `Forbidden`.
    pub fn from_status(status: StatusCode, headers: &HeaderMap) -> Self {
        match status.as_u16() {
            401 => GitHubError::InvalidCredentials,
            403 if remaining_quota(headers) == Some(0) => GitHubError::RateLimited,
            403 => GitHubError::Forbidden,
            404 => GitHubError::NotFound,
            429 => GitHubError::RateLimited,
            code @ 400..=499 => GitHubError::Client(code),
            code => GitHubError::Server(code),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound)
    }

    /// Server-side and transport failures are transient; 4xx never is
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitHubError::Server(_) | GitHubError::Transport(_))
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GitHubError::Parse(err.to_string())
        } else {
            GitHubError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GitHubError {
    fn from(err: serde_json::Error) -> Self {
        GitHubError::Parse(err.to_string())
    }
}
