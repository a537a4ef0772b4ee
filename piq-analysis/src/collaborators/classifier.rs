//! File-tree classification seam
//!
//! Deriving feature flags from file paths is owned elsewhere; the pipeline
//! only needs a pure, synchronous function over the tree.

use crate::ingestion::RepositoryTree;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub has_security_config: bool,
    pub has_tests: bool,
    pub has_ci_cd: bool,
    /// Paths that triggered any flag
    pub evidence: Vec<String>,
}

pub trait TreeClassifier: Send + Sync {
    fn classify(&self, tree: &RepositoryTree) -> FeatureFlags;
}

/// Classifier used when none is plugged in; reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClassifier;

impl TreeClassifier for NullClassifier {
    fn classify(&self, _tree: &RepositoryTree) -> FeatureFlags {
        FeatureFlags::default()
    }
}
