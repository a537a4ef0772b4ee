//! Collaborators the analysis core depends on but does not own
//!
//! - [`Evaluator`]: AI scoring of a snapshot
//! - [`ResultStore`]: repository records and analysis results
//! - [`TreeClassifier`]: feature flags from a file tree

pub mod classifier;
pub mod evaluator;
pub mod store;

pub use classifier::{FeatureFlags, NullClassifier, TreeClassifier};
pub use evaluator::{Evaluation, EvaluationError, Evaluator, NoopEvaluator, Scores};
pub use store::{AnalysisId, RecordId, ResultStore, SqliteResultStore, StoreError};
