use serde::{Deserialize, Serialize};

/// Rule a feed group or view uses to pick which activities it surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Following,
    Popular,
    Interest,
    Proximity,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Visible,
    Followers,
    Members,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[default]
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    #[default]
    Like,
}

/// Top-level phase of a pipeline run, used to tag fatal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Topology,
    Reset,
    Seed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Topology => "topology",
            PipelinePhase::Reset => "reset",
            PipelinePhase::Seed => "seed",
        }
    }
}

/// Stages of a seed run, in the order the engine walks through them.
///
/// `UsersUpserted` and `TopologyEnsured` are hard gates. The stages between
/// them and `Completed` run once per sample user and may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStage {
    NotStarted,
    UsersUpserted,
    TopologyEnsured,
    UserFeedsEnsuring,
    HashtagFeedsEnsuring,
    ActivitiesCreating,
    ReactionsAttaching,
    CommentsAttaching,
    Completed,
}

impl SeedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStage::NotStarted => "not_started",
            SeedStage::UsersUpserted => "users_upserted",
            SeedStage::TopologyEnsured => "topology_ensured",
            SeedStage::UserFeedsEnsuring => "user_feeds_ensuring",
            SeedStage::HashtagFeedsEnsuring => "hashtag_feeds_ensuring",
            SeedStage::ActivitiesCreating => "activities_creating",
            SeedStage::ReactionsAttaching => "reactions_attaching",
            SeedStage::CommentsAttaching => "comments_attaching",
            SeedStage::Completed => "completed",
        }
    }

    /// Stages that run per sample user and never abort the run
    pub fn is_best_effort(&self) -> bool {
        matches!(
            self,
            SeedStage::UserFeedsEnsuring
                | SeedStage::HashtagFeedsEnsuring
                | SeedStage::ActivitiesCreating
                | SeedStage::ReactionsAttaching
                | SeedStage::CommentsAttaching
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_kind_serializes_lowercase() {
        let json = serde_json::to_string(&SelectorKind::Following).unwrap();
        assert_eq!(json, "\"following\"");
        let kind: SelectorKind = serde_json::from_str("\"popular\"").unwrap();
        assert_eq!(kind, SelectorKind::Popular);
    }

    #[test]
    fn test_seed_stage_order_matches_engine_flow() {
        assert!(SeedStage::UsersUpserted < SeedStage::TopologyEnsured);
        assert!(SeedStage::TopologyEnsured < SeedStage::UserFeedsEnsuring);
        assert!(SeedStage::CommentsAttaching < SeedStage::Completed);
        assert!(!SeedStage::TopologyEnsured.is_best_effort());
        assert!(SeedStage::ActivitiesCreating.is_best_effort());
    }

    #[test]
    fn test_visibility_serializes_lowercase() {
        let json = serde_json::to_string(&Visibility::Public).unwrap();
        assert_eq!(json, "\"public\"");
    }
}
