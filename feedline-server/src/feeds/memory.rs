use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{FeedResult, FeedService, FeedServiceError};
use feedline_types::*;

/// A call the in-memory service can be told to fail
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    CreateFeedGroup(String),
    CreateFeedView(String),
    UpsertUsers,
    GetOrCreateFeed(FeedRef),
    AddActivity { user_id: String },
    QueryActivities,
    DeleteActivities,
    QueryFollows,
    Unfollow { source: FeedRef, target: FeedRef },
    AddReaction,
    AddComment,
}

#[derive(Default)]
struct State {
    feed_groups: BTreeMap<String, FeedGroupDef>,
    feed_views: BTreeMap<String, FeedViewDef>,
    users: BTreeMap<String, SampleUser>,
    feeds: HashMap<FeedRef, FeedOptions>,
    // Keyed by insertion sequence so cursors survive deletes
    activities: BTreeMap<u64, Activity>,
    follows: BTreeMap<u64, FollowEdge>,
    reactions: Vec<Reaction>,
    comments: Vec<Comment>,
    next_seq: u64,
    faults: HashSet<Fault>,
    delete_batches: Vec<usize>,
    unfollow_calls: usize,
}

impl State {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn check(&self, fault: &Fault) -> FeedResult<()> {
        if self.faults.contains(fault) {
            return Err(FeedServiceError::Remote {
                status: 500,
                code: None,
                message: format!("injected failure: {:?}", fault),
            });
        }
        Ok(())
    }
}

/// Feed service kept entirely in process memory.
///
/// Backs the `memory` backend for local demos and is the collaborator the
/// pipeline tests run against. Cursors are keyset based: a cursor names the
/// last record returned, so deleting a page never shifts the next one.
#[derive(Clone, Default)]
pub struct InMemoryFeedService {
    state: Arc<Mutex<State>>,
    not_found_when_empty: bool,
    always_return_cursor: bool,
}

impl InMemoryFeedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries against an empty dataset with "not found", the way a
    /// never-seeded remote environment does
    pub fn with_not_found_when_empty(mut self) -> Self {
        self.not_found_when_empty = true;
        self
    }

    /// Hand back a cursor with every page, including the last and empty ones
    pub fn with_cursor_echo(mut self) -> Self {
        self.always_return_cursor = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn inject(&self, fault: Fault) {
        self.state().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    pub fn feed_group_ids(&self) -> Vec<String> {
        self.state().feed_groups.keys().cloned().collect()
    }

    pub fn feed_view_ids(&self) -> Vec<String> {
        self.state().feed_views.keys().cloned().collect()
    }

    pub fn users(&self) -> Vec<SampleUser> {
        self.state().users.values().cloned().collect()
    }

    pub fn feed_options(&self, feed: &FeedRef) -> Option<FeedOptions> {
        self.state().feeds.get(feed).cloned()
    }

    pub fn activity_count(&self) -> usize {
        self.state().activities.len()
    }

    pub fn follow_count(&self) -> usize {
        self.state().follows.len()
    }

    pub fn reactions(&self) -> Vec<Reaction> {
        self.state().reactions.clone()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.state().comments.clone()
    }

    /// Size of every batch delete call received, in order
    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        self.state().delete_batches.clone()
    }

    pub fn unfollow_calls(&self) -> usize {
        self.state().unfollow_calls
    }

    fn paginate<T: Clone>(
        &self,
        records: &BTreeMap<u64, T>,
        limit: usize,
        next: Option<&str>,
        keep: impl Fn(&T) -> bool,
    ) -> FeedResult<Page<T>> {
        let after = match next {
            Some(cursor) => cursor
                .parse::<u64>()
                .map_err(|_| FeedServiceError::Remote {
                    status: 400,
                    code: Some(4),
                    message: format!("invalid cursor {}", cursor),
                })?,
            None => 0,
        };

        let mut matching = records
            .range(after + 1..)
            .filter(|(_, record)| keep(record));

        let page: Vec<(u64, T)> = matching
            .by_ref()
            .take(limit.max(1))
            .map(|(seq, record)| (*seq, record.clone()))
            .collect();
        let has_more = matching.next().is_some();

        if page.is_empty() {
            if next.is_none() && self.not_found_when_empty {
                return Err(FeedServiceError::NotFound("no records found".to_string()));
            }
            let echoed = self.always_return_cursor.then(|| after.to_string());
            return Ok(Page {
                items: Vec::new(),
                next: echoed,
            });
        }

        let next = (has_more || self.always_return_cursor)
            .then(|| page.last().map(|(seq, _)| seq.to_string()))
            .flatten();
        Ok(Page {
            items: page.into_iter().map(|(_, record)| record).collect(),
            next,
        })
    }
}

#[async_trait]
impl FeedService for InMemoryFeedService {
    async fn create_feed_group(&self, group: &FeedGroupDef) -> FeedResult<()> {
        let mut state = self.state();
        state.check(&Fault::CreateFeedGroup(group.id.clone()))?;
        if state.feed_groups.contains_key(&group.id) {
            return Err(FeedServiceError::AlreadyExists(format!(
                "feed group {} already exists",
                group.id
            )));
        }
        state.feed_groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn create_feed_view(&self, view: &FeedViewDef) -> FeedResult<()> {
        let mut state = self.state();
        state.check(&Fault::CreateFeedView(view.id.clone()))?;
        if state.feed_views.contains_key(&view.id) {
            return Err(FeedServiceError::AlreadyExists(format!(
                "feed view {} already exists",
                view.id
            )));
        }
        state.feed_views.insert(view.id.clone(), view.clone());
        Ok(())
    }

    async fn upsert_users(&self, users: &[SampleUser]) -> FeedResult<()> {
        let mut state = self.state();
        state.check(&Fault::UpsertUsers)?;
        for user in users {
            state.users.insert(user.id.clone(), user.clone());
        }
        Ok(())
    }

    async fn get_or_create_feed(&self, feed: &FeedRef, options: &FeedOptions) -> FeedResult<()> {
        let mut state = self.state();
        state.check(&Fault::GetOrCreateFeed(feed.clone()))?;
        if !state.feed_groups.contains_key(&feed.group) {
            return Err(FeedServiceError::NotFound(format!(
                "feed group {} does not exist",
                feed.group
            )));
        }
        state.feeds.entry(feed.clone()).or_insert_with(|| options.clone());
        Ok(())
    }

    async fn add_activity(&self, activity: &NewActivity) -> FeedResult<Activity> {
        let mut state = self.state();
        state.check(&Fault::AddActivity {
            user_id: activity.user_id.clone(),
        })?;
        if let Some(missing) = activity.feeds.iter().find(|f| !state.feeds.contains_key(*f)) {
            return Err(FeedServiceError::NotFound(format!("feed {} does not exist", missing)));
        }

        let created = Activity {
            id: Uuid::new_v4().to_string(),
            user_id: activity.user_id.clone(),
            kind: activity.kind,
            text: activity.text.clone(),
            feeds: activity.feeds.clone(),
            created_at: Utc::now(),
        };
        let seq = state.seq();
        state.activities.insert(seq, created.clone());
        Ok(created)
    }

    async fn query_activities(&self, query: &ActivityQuery) -> FeedResult<Page<Activity>> {
        let state = self.state();
        state.check(&Fault::QueryActivities)?;
        let feed = query.feed.clone();
        self.paginate(&state.activities, query.limit, query.next.as_deref(), |a| {
            feed.as_ref().map_or(true, |f| a.feeds.contains(f))
        })
    }

    async fn delete_activities(&self, ids: &[String], _hard_delete: bool) -> FeedResult<usize> {
        let mut state = self.state();
        state.check(&Fault::DeleteActivities)?;
        state.delete_batches.push(ids.len());

        let doomed: HashSet<&String> = ids.iter().collect();
        let before = state.activities.len();
        state.activities.retain(|_, a| !doomed.contains(&a.id));
        state.reactions.retain(|r| !doomed.contains(&r.activity_id));
        state.comments.retain(|c| !doomed.contains(&c.object_id));
        Ok(before - state.activities.len())
    }

    async fn follow(&self, source: &FeedRef, target: &FeedRef) -> FeedResult<FollowEdge> {
        let mut state = self.state();
        for feed in [source, target] {
            if !state.feeds.contains_key(feed) {
                return Err(FeedServiceError::NotFound(format!("feed {} does not exist", feed)));
            }
        }
        let edge = FollowEdge::new(source.clone(), target.clone());
        if state.follows.values().any(|e| e == &edge) {
            return Err(FeedServiceError::AlreadyExists(format!(
                "follow {} -> {} already exists",
                source, target
            )));
        }
        let seq = state.seq();
        state.follows.insert(seq, edge.clone());
        Ok(edge)
    }

    async fn query_follows(&self, page: &PageRequest) -> FeedResult<Page<FollowEdge>> {
        let state = self.state();
        state.check(&Fault::QueryFollows)?;
        self.paginate(&state.follows, page.limit, page.next.as_deref(), |_| true)
    }

    async fn unfollow(&self, source: &FeedRef, target: &FeedRef) -> FeedResult<()> {
        let mut state = self.state();
        state.unfollow_calls += 1;
        state.check(&Fault::Unfollow {
            source: source.clone(),
            target: target.clone(),
        })?;
        let key = state
            .follows
            .iter()
            .find(|(_, e)| &e.source == source && &e.target == target)
            .map(|(seq, _)| *seq)
            .ok_or_else(|| FeedServiceError::NotFound(format!("follow {} -> {} not found", source, target)))?;
        state.follows.remove(&key);
        Ok(())
    }

    async fn add_reaction(&self, reaction: &NewReaction) -> FeedResult<Reaction> {
        let mut state = self.state();
        state.check(&Fault::AddReaction)?;
        if !state.activities.values().any(|a| a.id == reaction.activity_id) {
            return Err(FeedServiceError::NotFound(format!(
                "activity {} does not exist",
                reaction.activity_id
            )));
        }
        let created = Reaction {
            id: Uuid::new_v4().to_string(),
            activity_id: reaction.activity_id.clone(),
            kind: reaction.kind,
            user_id: reaction.user_id.clone(),
        };
        state.reactions.push(created.clone());
        Ok(created)
    }

    async fn add_comment(&self, comment: &NewComment) -> FeedResult<Comment> {
        let mut state = self.state();
        state.check(&Fault::AddComment)?;
        if !state.activities.values().any(|a| a.id == comment.object_id) {
            return Err(FeedServiceError::NotFound(format!(
                "activity {} does not exist",
                comment.object_id
            )));
        }
        let created = Comment {
            id: Uuid::new_v4().to_string(),
            object_id: comment.object_id.clone(),
            object_type: comment.object_type.clone(),
            comment: comment.comment.clone(),
            user_id: comment.user_id.clone(),
        };
        state.comments.push(created.clone());
        Ok(created)
    }
}
