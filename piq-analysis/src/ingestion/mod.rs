//! Repository ingestion: remote fetches folded into one snapshot

pub mod pipeline;
pub mod snapshot;
pub mod source;
pub mod stage;

pub use pipeline::{IngestionError, IngestionPipeline, IngestionStage, DEFAULT_MAX_REPOSITORY_SIZE_KB};
pub use snapshot::{
    CommitSummary, IssueSummary, PullRequestSummary, ReadmeSummary, RepositoryMetadata, RepositorySnapshot,
    RepositoryTree,
};
pub use source::{GitHubSource, RepositorySource};
pub use stage::StageOutcome;
