//! AI evaluation seam

use crate::ingestion::RepositorySnapshot;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_README_SCORE: u32 = 30;
pub const MAX_TEST_SCORE: u32 = 30;
pub const MAX_COMMIT_SCORE: u32 = 25;
pub const MAX_CICD_SCORE: u32 = 15;

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex is valid"));

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Evaluation service failed: {0}")]
    Upstream(String),

    #[error("Evaluation response invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub readme: u32,
    pub test: u32,
    pub commit: u32,
    pub cicd: u32,
}

impl Scores {
    pub fn total(&self) -> u32 {
        self.readme + self.test + self.commit + self.cicd
    }

    /// Check each score against its ceiling (total ceiling is 100)
    pub fn validate(&self) -> Result<(), EvaluationError> {
        let checks = [
            ("readme", self.readme, MAX_README_SCORE),
            ("test", self.test, MAX_TEST_SCORE),
            ("commit", self.commit, MAX_COMMIT_SCORE),
            ("cicd", self.cicd, MAX_CICD_SCORE),
        ];
        for (name, value, max) in checks {
            if value > max {
                return Err(EvaluationError::InvalidResponse(format!(
                    "{} score {} exceeds {}",
                    name, value, max
                )));
            }
        }
        Ok(())
    }
}

/// Scored result of one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub scores: Scores,
}

impl Evaluation {
    /// Parse a model completion that should contain one JSON object
    ///
    /// Tolerates markdown code fences and prose around the object.
    pub fn from_completion(text: &str) -> Result<Self, EvaluationError> {
        let cleaned = text.replace("```json", "```");
        let cleaned = cleaned.trim();
        let json = JSON_OBJECT
            .find(cleaned)
            .map(|m| m.as_str())
            .unwrap_or(cleaned);

        let evaluation: Evaluation = serde_json::from_str(json)
            .map_err(|e| EvaluationError::InvalidResponse(e.to_string()))?;
        evaluation.scores.validate()?;
        Ok(evaluation)
    }
}

/// Render a list as `- item` lines, skipping blank entries
pub fn join_bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, snapshot: &RepositorySnapshot) -> Result<Evaluation, EvaluationError>;
}

/// Evaluator used when no AI backend is configured
///
/// Produces an explanatory summary and zero scores so the rest of the run
/// (persistence, completion event) still works end to end.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvaluator;

pub const NOOP_SUMMARY: &str = "AI evaluation is disabled: no AI API key is configured.";

#[async_trait]
impl Evaluator for NoopEvaluator {
    async fn evaluate(&self, snapshot: &RepositorySnapshot) -> Result<Evaluation, EvaluationError> {
        tracing::debug!(repository = %snapshot.metadata.full_name, "NoopEvaluator active");
        Ok(Evaluation {
            summary: NOOP_SUMMARY.to_string(),
            ..Evaluation::default()
        })
    }
}
