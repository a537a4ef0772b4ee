//! Resilient GitHub REST client
//!
//! Attaches auth and media-type headers to every call, paces requests with a
//! token bucket, retries transient failures with a fixed backoff and maps
//! everything else into [`GitHubError`].

use super::error::GitHubError;
use super::rate_limit::check_rate_limit;
use governor::{Quota, RateLimiter};
use piq_common::config::GitHubConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_USER_AGENT: &str = concat!("PortfolioIQ/", env!("CARGO_PKG_VERSION"));
pub const MEDIA_TYPE_JSON: &str = "application/vnd.github+json";
pub const MEDIA_TYPE_RAW: &str = "application/vnd.github.raw";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Query parameters for a request
pub type Query<'a> = &'a [(&'a str, String)];

/// Fixed-backoff retry policy for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub base_url: String,
    pub token: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub requests_per_second: u32,
}

impl GitHubClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            requests_per_second: 10,
        }
    }

    /// Build from the `[github]` config section
    pub fn from_config(config: &GitHubConfig) -> piq_common::Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| piq_common::config::is_valid_token(t))
            .ok_or_else(|| piq_common::Error::Config("GitHub token missing".to_string()))?;

        Ok(Self {
            base_url: config.api_url.clone(),
            token,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                backoff: Duration::from_millis(config.retry_backoff_ms),
            },
            requests_per_second: config.requests_per_second,
        })
    }
}

pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self, GitHubError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(default_headers)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            retry: config.retry,
            rate_limiter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON object
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<T, GitHubError> {
        let body = self.execute(path, query, MEDIA_TYPE_JSON).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET a JSON array
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query<'_>,
    ) -> Result<Vec<T>, GitHubError> {
        self.get::<Vec<T>>(path, query).await
    }

    /// GET raw file content (`application/vnd.github.raw`)
    pub async fn get_raw(&self, path: &str, query: Query<'_>) -> Result<String, GitHubError> {
        let body = self.execute(path, query, MEDIA_TYPE_RAW).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Send with retry; returns the body of a successful response
    async fn execute(&self, path: &str, query: Query<'_>, accept: &'static str) -> Result<Vec<u8>, GitHubError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.rate_limiter.until_ready().await;

            match self.send_once(&url, query, accept).await {
                Ok(body) => {
                    if attempt > 1 {
                        debug!(path, attempt, "GitHub request succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        path,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        backoff_ms = self.retry.backoff.as_millis() as u64,
                        error = %err,
                        "Transient GitHub failure, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(err) => {
                    debug!(path, attempt, error = %err, "GitHub request failed");
                    return Err(err);
                }
            }
        }
    }

    /// One attempt; the body is read here so a dropped body is retried too
    async fn send_once(&self, url: &str, query: Query<'_>, accept: &'static str) -> Result<Vec<u8>, GitHubError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| GitHubError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            check_rate_limit(response.headers());
            let body = response
                .bytes()
                .await
                .map_err(|e| GitHubError::Transport(e.to_string()))?;
            Ok(body.to_vec())
        } else {
            Err(GitHubError::from_status(status, response.headers()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_config_from_section() {
        let mut section = GitHubConfig::default();
        assert!(GitHubClientConfig::from_config(&section).is_err());

        section.token = Some("ghp_test".to_string());
        section.max_attempts = 3;
        section.retry_backoff_ms = 250;
        let config = GitHubClientConfig::from_config(&section).unwrap();
        assert_eq!(config.token, "ghp_test");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, Duration::from_millis(250));
        assert_eq!(config.base_url, "https://api.github.com");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = GitHubClient::new(GitHubClientConfig::new("http://localhost:1234/", "t")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
    }
}
