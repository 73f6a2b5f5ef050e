use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::enums::{ActivityKind, ReactionKind, SeedStage, SelectorKind, Visibility};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// Feed group that holds every user's personal feed
pub const USER_FEED_GROUP: &str = "user";

/// Feed group that holds one feed per hashtag token
pub const HASHTAG_FEED_GROUP: &str = "hashtag";

/// Address of a single feed, written `group:id` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedRef {
    pub group: String,
    pub id: String,
}

impl FeedRef {
    pub fn new(group: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            id: id.into(),
        }
    }

    /// Personal feed of a user
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::new(USER_FEED_GROUP, user_id)
    }

    /// Feed collecting every post tagged with `token`
    pub fn hashtag(token: impl Into<String>) -> Self {
        Self::new(HASHTAG_FEED_GROUP, token)
    }

    /// The `group:id` form used by the feed service
    pub fn fid(&self) -> String {
        format!("{}:{}", self.group, self.id)
    }
}

impl fmt::Display for FeedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFeedRefError(pub String);

impl fmt::Display for ParseFeedRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid feed reference '{}', expected group:id", self.0)
    }
}

impl std::error::Error for ParseFeedRefError {}

impl FromStr for FeedRef {
    type Err = ParseFeedRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, id)) if !group.is_empty() && !id.is_empty() => Ok(FeedRef::new(group, id)),
            _ => Err(ParseFeedRefError(s.to_string())),
        }
    }
}

impl Serialize for FeedRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fid())
    }
}

impl<'de> Deserialize<'de> for FeedRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// Topology definitions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySelector {
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    /// Extra selector filter, passed through to the feed service untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
}

impl ActivitySelector {
    pub fn new(kind: SelectorKind) -> Self {
        Self { kind, filter: None }
    }
}

/// Ordering strategy of a feed group or view.
///
/// Expression scores are opaque to us; the feed service evaluates them with
/// the named coefficients in `defaults`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ranking {
    Recency,
    Expression {
        score: String,
        #[serde(default)]
        defaults: BTreeMap<String, f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedGroupDef {
    pub id: String,
    #[serde(default)]
    pub activity_selectors: Vec<ActivitySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Ranking>,
    #[serde(default)]
    pub notification: bool,
    /// Days after creation at which the group stops surfacing activities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedViewDef {
    pub id: String,
    #[serde(default)]
    pub activity_selectors: Vec<ActivitySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Ranking>,
}

/// Options sent along with a get-or-create feed call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedOptions {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
}

impl FeedOptions {
    pub fn public_owned_by(user_id: impl Into<String>) -> Self {
        Self {
            visibility: Visibility::Public,
            created_by_id: Some(user_id.into()),
        }
    }
}

// Content

/// Demo identity plus the post it publishes when seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Demo post text published for this user
    #[serde(default)]
    pub post: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub text: String,
    pub feeds: Vec<FeedRef>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub feeds: Vec<FeedRef>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    pub source: FeedRef,
    pub target: FeedRef,
}

impl FollowEdge {
    pub fn new(source: FeedRef, target: FeedRef) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub activity_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReaction {
    pub activity_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub object_id: String,
    pub object_type: String,
    pub comment: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub object_id: String,
    pub object_type: String,
    pub comment: String,
    pub user_id: String,
}

impl NewComment {
    /// Comment attached to an activity
    pub fn on_activity(activity_id: impl Into<String>, text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            object_id: activity_id.into(),
            object_type: "activity".to_string(),
            comment: text.into(),
            user_id: user_id.into(),
        }
    }
}

// Pagination

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityQuery {
    /// Restrict the query to a single feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<FeedRef>,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// One page of a cursor-paginated query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// Cursor for the following page, ignoring empty-string cursors
    pub fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref().filter(|c| !c.is_empty())
    }
}

// Pipeline results

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyReport {
    pub feed_groups: Vec<String>,
    pub feed_views: Vec<String>,
    /// Definitions the feed service already had
    pub already_existing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub activities_deleted: usize,
    pub follows_deleted: usize,
    /// Follow edges whose unfollow call failed and were skipped
    pub follows_failed: usize,
    pub activity_pages: usize,
    pub follow_pages: usize,
    /// True when a page cap stopped a loop before the cursor ran out
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub stage: SeedStage,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub success: bool,
    pub user_ids: Vec<String>,
    /// Created activities, in creation order
    pub activity_ids: Vec<String>,
    pub users_attempted: usize,
    pub hashtag_feeds: Vec<String>,
    pub reactions_added: usize,
    pub comments_added: usize,
    pub failures: Vec<SeedFailure>,
}

impl SeedSummary {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Absent when the run skipped the reset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetSummary>,
    pub seed: SeedSummary,
}

// HTTP envelope

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRequest {
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_ref_parses_group_and_id() {
        let feed: FeedRef = "hashtag:newbeginnings".parse().unwrap();
        assert_eq!(feed, FeedRef::hashtag("newbeginnings"));
        assert_eq!(feed.to_string(), "hashtag:newbeginnings");
    }

    #[test]
    fn test_feed_ref_rejects_missing_parts() {
        assert!("user".parse::<FeedRef>().is_err());
        assert!(":alice".parse::<FeedRef>().is_err());
        assert!("user:".parse::<FeedRef>().is_err());
    }

    #[test]
    fn test_feed_ref_serializes_as_string() {
        let json = serde_json::to_string(&FeedRef::user("alice")).unwrap();
        assert_eq!(json, "\"user:alice\"");
        let back: FeedRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FeedRef::user("alice"));
    }

    #[test]
    fn test_ranking_expression_shape() {
        let json = r#"{"type":"expression","score":"popularity * w + base","defaults":{"w":2.0,"base":1.0}}"#;
        let ranking: Ranking = serde_json::from_str(json).unwrap();
        match ranking {
            Ranking::Expression { score, defaults } => {
                assert_eq!(score, "popularity * w + base");
                assert_eq!(defaults.get("w"), Some(&2.0));
            }
            Ranking::Recency => panic!("expected expression ranking"),
        }
    }

    #[test]
    fn test_page_next_cursor_ignores_empty() {
        let page: Page<u8> = Page {
            items: vec![1],
            next: Some(String::new()),
        };
        assert_eq!(page.next_cursor(), None);
    }
}
