//! GitHub REST API access

pub mod client;
pub mod error;
pub mod models;
pub mod rate_limit;

pub use client::{GitHubClient, GitHubClientConfig, RetryPolicy};
pub use error::GitHubError;
