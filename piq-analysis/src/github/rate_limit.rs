//! Rate-limit header inspection
//!
//! GitHub reports the remaining request quota in `X-RateLimit-Remaining` and
//! the reset instant (epoch seconds) in `X-RateLimit-Reset`. Log severity
//! rises as the quota shrinks; missing headers are normal for some endpoints.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// At or below this many remaining requests, log a warning
pub const WARN_THRESHOLD: u32 = 100;
/// At or below this many remaining requests, log an error
pub const CRITICAL_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLevel {
    Healthy,
    Low,
    Critical,
}

impl QuotaLevel {
    pub fn for_remaining(remaining: u32) -> Self {
        if remaining <= CRITICAL_THRESHOLD {
            QuotaLevel::Critical
        } else if remaining <= WARN_THRESHOLD {
            QuotaLevel::Low
        } else {
            QuotaLevel::Healthy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    pub fn level(&self) -> QuotaLevel {
        QuotaLevel::for_remaining(self.remaining)
    }

    pub fn minutes_until_reset(&self) -> i64 {
        (self.reset_at - Utc::now()).num_minutes().max(0)
    }
}

/// Parse rate-limit headers
///
/// `Ok(None)` when either header is missing, `Err` when present but malformed.
pub fn parse_rate_limit(headers: &HeaderMap) -> Result<Option<RateLimitStatus>, String> {
    let (Some(remaining), Some(reset)) = (headers.get(REMAINING_HEADER), headers.get(RESET_HEADER))
    else {
        return Ok(None);
    };

    let remaining = remaining
        .to_str()
        .map_err(|e| e.to_string())?
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid {}: {}", REMAINING_HEADER, e))?;
    let reset_secs = reset
        .to_str()
        .map_err(|e| e.to_string())?
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid {}: {}", RESET_HEADER, e))?;
    let reset_at = Utc
        .timestamp_opt(reset_secs, 0)
        .single()
        .ok_or_else(|| format!("{} out of range: {}", RESET_HEADER, reset_secs))?;

    Ok(Some(RateLimitStatus { remaining, reset_at }))
}

/// Remaining quota alone, used when mapping a 403
pub fn remaining_quota(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(REMAINING_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Log the quota state after a successful response; never fails
pub fn check_rate_limit(headers: &HeaderMap) -> Option<QuotaLevel> {
    match parse_rate_limit(headers) {
        Ok(Some(status)) => {
            let minutes = status.minutes_until_reset();
            let level = status.level();
            match level {
                QuotaLevel::Critical => tracing::error!(
                    remaining = status.remaining,
                    reset_in_minutes = minutes,
                    "GitHub API quota nearly exhausted"
                ),
                QuotaLevel::Low => tracing::warn!(
                    remaining = status.remaining,
                    reset_in_minutes = minutes,
                    "GitHub API quota running low"
                ),
                QuotaLevel::Healthy => tracing::info!(
                    remaining = status.remaining,
                    reset_in_minutes = minutes,
                    "GitHub API quota"
                ),
            }
            Some(level)
        }
        Ok(None) => {
            tracing::debug!("GitHub response carried no rate-limit headers");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse GitHub rate-limit headers");
            None
        }
    }
}
