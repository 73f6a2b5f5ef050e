use futures::future::{try_join, try_join_all};
use std::sync::Arc;

use super::error::{DefinitionKind, ProvisionError};
use crate::config::Topology;
use crate::feeds::{FeedResult, FeedService};
use feedline_types::TopologyReport;

/// Creates the feed groups and views everything else depends on.
///
/// Runs every time it is asked to; the remote side may have been wiped
/// without this process knowing.
pub struct TopologyProvisioner {
    feeds: Arc<dyn FeedService>,
    topology: Topology,
}

/// `Ok(true)` when created, `Ok(false)` when it was already there
fn tolerate_existing(result: FeedResult<()>) -> FeedResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

impl TopologyProvisioner {
    pub fn new(feeds: Arc<dyn FeedService>, topology: Topology) -> Self {
        Self { feeds, topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Create every configured definition, concurrently.
    ///
    /// "Already exists" counts as success. Any other failure aborts the call
    /// and names the definition that failed.
    pub async fn ensure_topology(&self) -> Result<TopologyReport, ProvisionError> {
        tracing::info!(
            feed_groups = self.topology.feed_groups.len(),
            feed_views = self.topology.feed_views.len(),
            "Ensuring feed topology"
        );

        let groups = try_join_all(self.topology.feed_groups.iter().map(|group| async move {
            let created = tolerate_existing(self.feeds.create_feed_group(group).await).map_err(|source| {
                ProvisionError {
                    kind: DefinitionKind::FeedGroup,
                    id: group.id.clone(),
                    source,
                }
            })?;
            tracing::debug!(id = %group.id, created, "Feed group ensured");
            Ok::<_, ProvisionError>((group.id.clone(), created))
        }));

        let views = try_join_all(self.topology.feed_views.iter().map(|view| async move {
            let created = tolerate_existing(self.feeds.create_feed_view(view).await).map_err(|source| {
                ProvisionError {
                    kind: DefinitionKind::FeedView,
                    id: view.id.clone(),
                    source,
                }
            })?;
            tracing::debug!(id = %view.id, created, "Feed view ensured");
            Ok::<_, ProvisionError>((view.id.clone(), created))
        }));

        let (groups, views) = try_join(groups, views).await.map_err(|e| {
            tracing::error!(error = %e, "Topology provisioning failed");
            e
        })?;

        let mut report = TopologyReport::default();
        for (id, created) in groups {
            if !created {
                report.already_existing.push(id.clone());
            }
            report.feed_groups.push(id);
        }
        for (id, created) in views {
            if !created {
                report.already_existing.push(id.clone());
            }
            report.feed_views.push(id);
        }

        tracing::info!(
            existing = report.already_existing.len(),
            "Feed topology ready"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{Fault, FeedServiceError, InMemoryFeedService};

    fn provisioner(service: &InMemoryFeedService) -> TopologyProvisioner {
        let topology = Topology::load(None).expect("bundled topology");
        TopologyProvisioner::new(Arc::new(service.clone()), topology)
    }

    #[tokio::test]
    async fn test_creates_every_definition() {
        let service = InMemoryFeedService::new();
        let provisioner = provisioner(&service);

        let report = provisioner.ensure_topology().await.unwrap();

        assert!(report.already_existing.is_empty());
        let mut expected: Vec<String> = provisioner
            .topology()
            .feed_groups
            .iter()
            .map(|g| g.id.clone())
            .collect();
        expected.sort();
        assert_eq!(service.feed_group_ids(), expected);
        assert_eq!(service.feed_view_ids().len(), provisioner.topology().feed_views.len());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let service = InMemoryFeedService::new();
        let provisioner = provisioner(&service);

        provisioner.ensure_topology().await.unwrap();
        let groups_once = service.feed_group_ids();
        let views_once = service.feed_view_ids();

        let report = provisioner.ensure_topology().await.unwrap();

        assert_eq!(service.feed_group_ids(), groups_once);
        assert_eq!(service.feed_view_ids(), views_once);
        assert_eq!(
            report.already_existing.len(),
            groups_once.len() + views_once.len()
        );
    }

    #[tokio::test]
    async fn test_other_remote_errors_abort() {
        let service = InMemoryFeedService::new();
        service.inject(Fault::CreateFeedGroup("hashtag".to_string()));
        let provisioner = provisioner(&service);

        let err = provisioner.ensure_topology().await.unwrap_err();

        assert_eq!(err.kind, DefinitionKind::FeedGroup);
        assert_eq!(err.id, "hashtag");
        assert!(matches!(err.source, FeedServiceError::Remote { .. }));
    }

    #[tokio::test]
    async fn test_view_failure_is_reported_as_view() {
        let service = InMemoryFeedService::new();
        service.inject(Fault::CreateFeedView("popular-view".to_string()));
        let provisioner = provisioner(&service);

        let err = provisioner.ensure_topology().await.unwrap_err();

        assert_eq!(err.kind, DefinitionKind::FeedView);
        assert_eq!(err.id, "popular-view");
    }
}
