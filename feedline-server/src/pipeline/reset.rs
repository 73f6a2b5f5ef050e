use std::sync::Arc;

use super::error::ResetError;
use crate::feeds::FeedService;
use feedline_types::{ActivityQuery, PageRequest, ResetSummary};

/// Drains every activity and follow edge from the feed service.
///
/// Users, feed groups and feed views are left untouched.
pub struct ResetEngine {
    feeds: Arc<dyn FeedService>,
    page_size: usize,
    max_pages: usize,
}

impl ResetEngine {
    pub fn new(feeds: Arc<dyn FeedService>, page_size: usize, max_pages: usize) -> Self {
        Self {
            feeds,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Delete all activities, then all follow edges.
    ///
    /// An empty environment is a zero summary, not an error. Activity pages
    /// are deleted as one batch each and a failed batch aborts the reset;
    /// follow edges are removed one at a time and failures are skipped.
    pub async fn reset_feeds(&self) -> Result<ResetSummary, ResetError> {
        tracing::info!(page_size = self.page_size, "Resetting feeds");

        let mut summary = ResetSummary::default();
        self.drain_activities(&mut summary).await?;
        self.drain_follows(&mut summary).await?;

        tracing::info!(
            activities = summary.activities_deleted,
            follows = summary.follows_deleted,
            follows_failed = summary.follows_failed,
            truncated = summary.truncated,
            "Reset complete"
        );
        Ok(summary)
    }

    async fn drain_activities(&self, summary: &mut ResetSummary) -> Result<(), ResetError> {
        let mut next: Option<String> = None;

        loop {
            if summary.activity_pages >= self.max_pages {
                tracing::warn!(pages = summary.activity_pages, "Activity page cap reached, stopping");
                summary.truncated = true;
                return Ok(());
            }
            let page_no = summary.activity_pages + 1;

            let query = ActivityQuery {
                feed: None,
                limit: self.page_size,
                next: next.take(),
            };
            let page = match self.feeds.query_activities(&query).await {
                Ok(page) => page,
                Err(e) if e.is_not_found() && page_no == 1 => {
                    tracing::info!("No activities found, nothing to delete");
                    return Ok(());
                }
                Err(source) => {
                    tracing::error!(page = page_no, error = %source, "Activity query failed");
                    return Err(ResetError::QueryActivities { page: page_no, source });
                }
            };
            summary.activity_pages = page_no;

            // An empty page ends the loop even if a cursor came back with it
            if page.items.is_empty() {
                return Ok(());
            }

            let ids: Vec<String> = page.items.iter().map(|a| a.id.clone()).collect();
            let deleted = self
                .feeds
                .delete_activities(&ids, true)
                .await
                .map_err(|source| {
                    tracing::error!(page = page_no, batch = ids.len(), error = %source, "Activity batch delete failed");
                    ResetError::DeleteActivities {
                        page: page_no,
                        batch: ids.len(),
                        source,
                    }
                })?;
            summary.activities_deleted += deleted;
            tracing::info!(
                page = page_no,
                count = deleted,
                total = summary.activities_deleted,
                "Deleted activity page"
            );

            match page.next_cursor() {
                Some(cursor) => next = Some(cursor.to_string()),
                None => return Ok(()),
            }
        }
    }

    async fn drain_follows(&self, summary: &mut ResetSummary) -> Result<(), ResetError> {
        let mut next: Option<String> = None;

        loop {
            if summary.follow_pages >= self.max_pages {
                tracing::warn!(pages = summary.follow_pages, "Follow page cap reached, stopping");
                summary.truncated = true;
                return Ok(());
            }
            let page_no = summary.follow_pages + 1;

            let request = PageRequest {
                limit: self.page_size,
                next: next.take(),
            };
            let page = match self.feeds.query_follows(&request).await {
                Ok(page) => page,
                Err(e) if e.is_not_found() && page_no == 1 => {
                    tracing::info!("No follows found, nothing to delete");
                    return Ok(());
                }
                Err(source) => {
                    tracing::error!(page = page_no, error = %source, "Follow query failed");
                    return Err(ResetError::QueryFollows { page: page_no, source });
                }
            };
            summary.follow_pages = page_no;

            if page.items.is_empty() {
                return Ok(());
            }

            for edge in &page.items {
                match self.feeds.unfollow(&edge.source, &edge.target).await {
                    Ok(()) => summary.follows_deleted += 1,
                    Err(e) => {
                        tracing::warn!(
                            source = %edge.source,
                            target = %edge.target,
                            error = %e,
                            "Failed to remove follow, skipping"
                        );
                        summary.follows_failed += 1;
                    }
                }
            }
            tracing::info!(
                page = page_no,
                count = page.items.len(),
                total = summary.follows_deleted,
                "Processed follow page"
            );

            match page.next_cursor() {
                Some(cursor) => next = Some(cursor.to_string()),
                None => return Ok(()),
            }
        }
    }
}
