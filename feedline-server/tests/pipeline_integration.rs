// End-to-end pipeline runs against the in-memory feed service

use std::collections::BTreeSet;
use std::sync::Arc;

use feedline_server::config::{Roster, Topology};
use feedline_server::feeds::{Fault, FeedService, InMemoryFeedService};
use feedline_server::pipeline::{Pipeline, PipelineError, SeedOptions};
use feedline_types::*;

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

async fn publish(service: &InMemoryFeedService, author: &str, count: usize) {
    let feed = FeedRef::user(author);
    service
        .get_or_create_feed(&feed, &FeedOptions::public_owned_by(author))
        .await
        .unwrap();
    for i in 0..count {
        service
            .add_activity(&NewActivity {
                user_id: author.to_string(),
                kind: ActivityKind::Post,
                feeds: vec![feed.clone()],
                text: format!("leftover {}", i),
            })
            .await
            .unwrap();
    }
}

async fn feed_activities(service: &InMemoryFeedService, feed: FeedRef) -> Vec<Activity> {
    service
        .query_activities(&ActivityQuery {
            feed: Some(feed),
            limit: 100,
            next: None,
        })
        .await
        .unwrap()
        .items
}

/// Every activity id in the service, walked page by page
async fn all_activity_ids(service: &InMemoryFeedService, page_size: usize) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let mut next = None;
    loop {
        let page = service
            .query_activities(&ActivityQuery {
                feed: None,
                limit: page_size,
                next: next.take(),
            })
            .await
            .unwrap();
        ids.extend(page.items.iter().map(|a| a.id.clone()));
        match page.next_cursor() {
            Some(cursor) if !page.items.is_empty() => next = Some(cursor.to_string()),
            _ => return ids,
        }
    }
}

#[tokio::test]
async fn test_reset_and_seed_round_trip() {
    let service = InMemoryFeedService::new();
    let pipeline = pipeline(&service);

    let first = pipeline.reset_and_seed("operator").await.unwrap();
    let second = pipeline.reset_and_seed("operator").await.unwrap();

    // The second reset removed exactly what the first seed made
    let reset = second.reset.unwrap();
    assert_eq!(reset.activities_deleted, first.seed.activity_ids.len());
    assert_eq!(reset.follows_deleted, 0);

    // Paging through the service yields exactly the ids the seed reported
    let seeded: BTreeSet<String> = second.seed.activity_ids.iter().cloned().collect();
    assert_eq!(seeded.len(), second.seed.activity_ids.len());
    assert_eq!(all_activity_ids(&service, 2).await, seeded);
    let first_ids: BTreeSet<String> = first.seed.activity_ids.iter().cloned().collect();
    assert!(first_ids.is_disjoint(&seeded), "nothing from the first run survives");
    assert_eq!(service.reactions().len(), 3);
    assert_eq!(service.comments().len(), 2);
    assert_eq!(service.users().len(), 5);
}

#[tokio::test]
async fn test_reset_clears_every_page() {
    let service = InMemoryFeedService::new();
    let pipeline = pipeline(&service);
    pipeline.ensure_topology().await.unwrap();
    publish(&service, "author", 250).await;

    let report = pipeline.reset_and_seed("operator").await.unwrap();

    let reset = report.reset.unwrap();
    assert_eq!(service.delete_batch_sizes(), vec![100, 100, 50]);
    assert_eq!(reset.activities_deleted, 250);
    assert!(!reset.truncated);
    assert_eq!(service.activity_count(), 5, "only freshly seeded activities remain");
}

#[tokio::test]
async fn test_reset_removes_follows_but_keeps_topology_and_users() {
    let service = InMemoryFeedService::new();
    let pipeline = pipeline(&service);
    pipeline.seed_only("operator").await.unwrap();
    service
        .follow(&FeedRef::user("bob"), &FeedRef::user("alice"))
        .await
        .unwrap();
    service
        .follow(&FeedRef::user("alice"), &FeedRef::hashtag("running"))
        .await
        .unwrap();
    let groups = service.feed_group_ids();

    let summary = pipeline.reset_feeds().await.unwrap();

    assert_eq!(summary.follows_deleted, 2);
    assert_eq!(service.follow_count(), 0);
    assert_eq!(service.activity_count(), 0);
    assert_eq!(service.feed_group_ids(), groups);
    assert_eq!(service.users().len(), 5);
}

#[tokio::test]
async fn test_partial_failure_still_seeds_the_rest() {
    let service = InMemoryFeedService::new();
    service.inject(Fault::AddActivity {
        user_id: "charlie".to_string(),
    });
    let pipeline = pipeline(&service);

    let report = pipeline.reset_and_seed("operator").await.unwrap();

    assert!(report.seed.success);
    assert!(report.seed.is_degraded());
    assert_eq!(report.seed.users_attempted, 5);
    assert_eq!(report.seed.activity_ids.len(), 4);
    assert_eq!(service.activity_count(), 4);
    let failure = &report.seed.failures[0];
    assert_eq!(failure.user_id.as_deref(), Some("charlie"));
    assert_eq!(failure.stage, SeedStage::ActivitiesCreating);
}

#[tokio::test]
async fn test_hashtag_feed_holds_the_author_post() {
    let service = InMemoryFeedService::new();
    let pipeline = pipeline(&service);

    pipeline.reset_and_seed("operator").await.unwrap();

    let tagged = feed_activities(&service, FeedRef::hashtag("newbeginnings")).await;
    assert_eq!(tagged.len(), 1);
    let own = feed_activities(&service, FeedRef::user("alice")).await;
    assert_eq!(own.len(), 1);
    assert_eq!(tagged[0].id, own[0].id);
    assert_eq!(tagged[0].user_id, "alice");

    // Mixed-case tags land in the lowercased feed
    let morning = feed_activities(&service, FeedRef::hashtag("morning")).await;
    assert_eq!(morning.len(), 1);
    assert_eq!(morning[0].user_id, "charlie");
}

#[tokio::test]
async fn test_never_seeded_environment_resets_cleanly() {
    let service = InMemoryFeedService::new().with_not_found_when_empty();
    let pipeline = pipeline(&service);

    let report = pipeline.reset_and_seed("operator").await.unwrap();

    let reset = report.reset.unwrap();
    assert_eq!(reset.activities_deleted, 0);
    assert_eq!(reset.follows_deleted, 0);
    assert_eq!(report.seed.activity_ids.len(), 5);
}

#[tokio::test]
async fn test_failed_upsert_is_a_seed_phase_error() {
    let service = InMemoryFeedService::new();
    service.inject(Fault::UpsertUsers);
    let pipeline = pipeline(&service);

    let err = pipeline.reset_and_seed("operator").await.unwrap_err();

    assert!(matches!(err, PipelineError::Seed(_)));
    assert_eq!(err.phase(), PipelinePhase::Seed);
    assert_eq!(service.activity_count(), 0);
}
