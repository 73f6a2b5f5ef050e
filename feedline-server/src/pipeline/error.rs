use thiserror::Error;

use crate::feeds::FeedServiceError;
use feedline_types::PipelinePhase;

/// Which kind of topology definition failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    FeedGroup,
    FeedView,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::FeedGroup => "feed group",
            DefinitionKind::FeedView => "feed view",
        }
    }
}

#[derive(Debug, Error)]
#[error("Failed to provision {} '{id}': {source}", .kind.as_str())]
pub struct ProvisionError {
    pub kind: DefinitionKind,
    pub id: String,
    #[source]
    pub source: FeedServiceError,
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("Failed to query activities (page {page}): {source}")]
    QueryActivities {
        page: usize,
        #[source]
        source: FeedServiceError,
    },

    #[error("Failed to delete activity batch of {batch} (page {page}): {source}")]
    DeleteActivities {
        page: usize,
        batch: usize,
        #[source]
        source: FeedServiceError,
    },

    #[error("Failed to query follows (page {page}): {source}")]
    QueryFollows {
        page: usize,
        #[source]
        source: FeedServiceError,
    },
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to upsert sample users: {0}")]
    UpsertUsers(#[source] FeedServiceError),

    #[error(transparent)]
    Topology(#[from] ProvisionError),
}

/// Fatal outcome of a pipeline call; partial successes are summaries, not errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Topology provisioning failed: {0}")]
    Topology(#[from] ProvisionError),

    #[error("Reset failed: {0}")]
    Reset(#[from] ResetError),

    #[error("Seed failed: {0}")]
    Seed(#[from] SeedError),
}

impl PipelineError {
    /// Phase that aborted the run
    pub fn phase(&self) -> PipelinePhase {
        match self {
            PipelineError::Topology(_) => PipelinePhase::Topology,
            PipelineError::Reset(_) => PipelinePhase::Reset,
            PipelineError::Seed(_) => PipelinePhase::Seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_failing_step() {
        let err = PipelineError::from(ResetError::QueryActivities {
            page: 1,
            source: FeedServiceError::Network("connection refused".to_string()),
        });
        assert_eq!(err.phase(), PipelinePhase::Reset);
        assert!(err.to_string().contains("page 1"));
    }

    #[test]
    fn test_provision_error_message_names_definition() {
        let err = ProvisionError {
            kind: DefinitionKind::FeedGroup,
            id: "foryou".to_string(),
            source: FeedServiceError::Network("timeout".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to provision feed group 'foryou': Network error: timeout"
        );
    }
}
