//! Per-stage outcome folding

use crate::github::GitHubError;

/// Result of one ingestion stage
///
/// `Absent` covers both a not-found response and data the stage considers
/// empty (blank readme, empty tree). Only `Fatal` aborts the run.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Ok(T),
    Absent,
    Fatal(GitHubError),
}

impl<T> StageOutcome<T> {
    /// Fold a client result: not-found becomes `Absent`, other errors are fatal
    pub fn from_result(result: Result<T, GitHubError>) -> Self {
        match result {
            Ok(value) => StageOutcome::Ok(value),
            Err(GitHubError::NotFound) => StageOutcome::Absent,
            Err(err) => StageOutcome::Fatal(err),
        }
    }

    /// Same as [`from_result`](Self::from_result) for calls that may also report "no data"
    pub fn from_optional(result: Result<Option<T>, GitHubError>) -> Self {
        match StageOutcome::from_result(result) {
            StageOutcome::Ok(Some(value)) => StageOutcome::Ok(value),
            StageOutcome::Ok(None) | StageOutcome::Absent => StageOutcome::Absent,
            StageOutcome::Fatal(err) => StageOutcome::Fatal(err),
        }
    }

    /// Collapse to an optional value, propagating fatal errors
    pub fn into_option(self) -> Result<Option<T>, GitHubError> {
        match self {
            StageOutcome::Ok(value) => Ok(Some(value)),
            StageOutcome::Absent => Ok(None),
            StageOutcome::Fatal(err) => Err(err),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, StageOutcome::Absent)
    }
}

impl<T: Default> StageOutcome<T> {
    /// Collapse to a value, absent meaning empty
    pub fn or_empty(self) -> Result<T, GitHubError> {
        Ok(self.into_option()?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_absent() {
        let outcome: StageOutcome<Vec<u8>> = StageOutcome::from_result(Err(GitHubError::NotFound));
        assert!(outcome.is_absent());
        assert_eq!(outcome.or_empty(), Ok(vec![]));
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let outcome: StageOutcome<Vec<u8>> = StageOutcome::from_result(Err(GitHubError::RateLimited));
        assert_eq!(outcome, StageOutcome::Fatal(GitHubError::RateLimited));
        assert_eq!(outcome.or_empty(), Err(GitHubError::RateLimited));
    }

    #[test]
    fn test_optional_none_is_absent() {
        let outcome: StageOutcome<String> = StageOutcome::from_optional(Ok(None));
        assert_eq!(outcome.into_option(), Ok(None));

        let outcome = StageOutcome::from_optional(Ok(Some("x".to_string())));
        assert_eq!(outcome.into_option(), Ok(Some("x".to_string())));
    }
}
