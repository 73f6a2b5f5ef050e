use anyhow::{Context, Result};
use std::sync::Arc;

use super::error::PipelineError;
use super::reset::ResetEngine;
use super::seed::{SeedEngine, SeedOptions};
use super::topology::TopologyProvisioner;
use crate::config::{FeedBackend, Roster, Settings, Topology};
use crate::feeds::{FeedService, HttpFeedService, HttpFeedServiceConfig, InMemoryFeedService};
use feedline_types::{PipelineReport, ResetSummary, TopologyReport};

/// Sequences provisioning, reset and seeding against one feed service.
///
/// Holds no state between runs: every call re-reads the remote side.
pub struct Pipeline {
    provisioner: Arc<TopologyProvisioner>,
    reset: ResetEngine,
    seed: SeedEngine,
}

impl Pipeline {
    pub fn new(
        feeds: Arc<dyn FeedService>,
        topology: Topology,
        roster: Roster,
        page_size: usize,
        max_pages: usize,
        options: SeedOptions,
    ) -> Self {
        let provisioner = Arc::new(TopologyProvisioner::new(feeds.clone(), topology));
        let reset = ResetEngine::new(feeds.clone(), page_size, max_pages);
        let seed = SeedEngine::new(feeds, provisioner.clone(), roster, options);
        Self {
            provisioner,
            reset,
            seed,
        }
    }

    /// Build the pipeline and its feed service backend from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let topology = settings.topology().context("Failed to load feed topology")?;
        let roster = settings.roster().context("Failed to load sample-user roster")?;

        let feeds: Arc<dyn FeedService> = match settings.feed_service.backend {
            FeedBackend::Http => {
                let config = HttpFeedServiceConfig {
                    base_url: settings.feed_service.base_url.clone(),
                    api_key: settings.feed_service.api_key.clone(),
                    token: settings.feed_service.token.clone(),
                    timeout_secs: settings.feed_service.timeout_secs,
                };
                Arc::new(HttpFeedService::new(config).context("Failed to build feed service client")?)
            }
            FeedBackend::Memory => {
                tracing::warn!("Using the in-memory feed service; nothing will be persisted");
                Arc::new(InMemoryFeedService::new())
            }
        };

        let pipeline = &settings.pipeline;
        let options = SeedOptions {
            reaction_limit: pipeline.reaction_limit,
            comment_limit: pipeline.comment_limit,
            comment_text: pipeline.comment_text.clone(),
        };
        Ok(Self::new(
            feeds,
            topology,
            roster,
            pipeline.page_size,
            pipeline.max_pages,
            options,
        ))
    }

    pub async fn ensure_topology(&self) -> Result<TopologyReport, PipelineError> {
        Ok(self.provisioner.ensure_topology().await?)
    }

    pub async fn reset_feeds(&self) -> Result<ResetSummary, PipelineError> {
        Ok(self.reset.reset_feeds().await?)
    }

    /// Clear all activities and follows, then seed from scratch.
    ///
    /// A failed reset returns before seeding starts.
    pub async fn reset_and_seed(&self, acting_user_id: &str) -> Result<PipelineReport, PipelineError> {
        let reset = self.reset.reset_feeds().await?;
        let seed = self.seed.seed_feeds(acting_user_id).await?;
        Ok(PipelineReport {
            reset: Some(reset),
            seed,
        })
    }

    /// Seed on top of whatever is already there
    pub async fn seed_only(&self, acting_user_id: &str) -> Result<PipelineReport, PipelineError> {
        let seed = self.seed.seed_feeds(acting_user_id).await?;
        Ok(PipelineReport { reset: None, seed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::Fault;
    use feedline_types::{FeedRef, PipelinePhase};

    fn pipeline(service: &InMemoryFeedService) -> Pipeline {
        Pipeline::new(
            Arc::new(service.clone()),
            Topology::load(None).unwrap(),
            Roster::load(None).unwrap(),
            100,
            1000,
            SeedOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_reset_failure_skips_seeding() {
        let service = InMemoryFeedService::new();
        let pipeline = pipeline(&service);
        pipeline.seed_only("operator").await.unwrap();
        service.inject(Fault::DeleteActivities);

        let err = pipeline.reset_and_seed("operator").await.unwrap_err();

        assert_eq!(err.phase(), PipelinePhase::Reset);
        assert_eq!(service.activity_count(), 5, "no new activities after a failed reset");
    }

    #[tokio::test]
    async fn test_seed_only_keeps_existing_state() {
        let service = InMemoryFeedService::new();
        let pipeline = pipeline(&service);
        pipeline.seed_only("operator").await.unwrap();
        service
            .follow(&FeedRef::user("bob"), &FeedRef::user("alice"))
            .await
            .unwrap();

        let report = pipeline.seed_only("operator").await.unwrap();

        assert!(report.reset.is_none());
        assert_eq!(service.activity_count(), 10);
        assert_eq!(service.follow_count(), 1);
    }

    #[tokio::test]
    async fn test_topology_failure_reports_seed_phase() {
        let service = InMemoryFeedService::new();
        service.inject(Fault::CreateFeedView("following-view".to_string()));
        let pipeline = pipeline(&service);

        let err = pipeline.seed_only("operator").await.unwrap_err();
        assert_eq!(err.phase(), PipelinePhase::Seed);

        let err = pipeline.ensure_topology().await.unwrap_err();
        assert_eq!(err.phase(), PipelinePhase::Topology);
    }
}
