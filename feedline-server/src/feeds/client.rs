use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::{FeedResult, FeedServiceError};
use feedline_types::*;

/// Operations the pipeline needs from the remote feed service.
///
/// Implementations return typed errors: "already exists" and "not found"
/// must come back as their own variants, never as a generic remote error.
#[async_trait]
pub trait FeedService: Send + Sync {
    async fn create_feed_group(&self, group: &FeedGroupDef) -> FeedResult<()>;

    async fn create_feed_view(&self, view: &FeedViewDef) -> FeedResult<()>;

    /// Create or update users; attributes are overwritten on every call
    async fn upsert_users(&self, users: &[SampleUser]) -> FeedResult<()>;

    async fn get_or_create_feed(&self, feed: &FeedRef, options: &FeedOptions) -> FeedResult<()>;

    async fn add_activity(&self, activity: &NewActivity) -> FeedResult<Activity>;

    async fn query_activities(&self, query: &ActivityQuery) -> FeedResult<Page<Activity>>;

    /// Delete a batch of activities in one call, returning how many were removed
    async fn delete_activities(&self, ids: &[String], hard_delete: bool) -> FeedResult<usize>;

    async fn follow(&self, source: &FeedRef, target: &FeedRef) -> FeedResult<FollowEdge>;

    async fn query_follows(&self, page: &PageRequest) -> FeedResult<Page<FollowEdge>>;

    async fn unfollow(&self, source: &FeedRef, target: &FeedRef) -> FeedResult<()>;

    async fn add_reaction(&self, reaction: &NewReaction) -> FeedResult<Reaction>;

    async fn add_comment(&self, comment: &NewComment) -> FeedResult<Comment>;
}

/// Connection details for the HTTP feed service
#[derive(Debug, Clone)]
pub struct HttpFeedServiceConfig {
    pub base_url: String,
    pub api_key: String,
    /// Pre-issued server token; minting it is someone else's job
    pub token: String,
    pub timeout_secs: u64,
}

/// Feed service client speaking JSON over HTTP
#[derive(Clone)]
pub struct HttpFeedService {
    client: Client,
    base_url: String,
    api_key: String,
    token: String,
}

#[derive(Serialize)]
struct FeedGroupBody<'a> {
    id: &'a str,
    activity_selectors: &'a [ActivitySelector],
    #[serde(skip_serializing_if = "Option::is_none")]
    ranking: Option<&'a Ranking>,
    notification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cutoff_time: Option<String>,
}

#[derive(Serialize)]
struct UserBody<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Deserialize)]
struct ActivityEnvelope {
    activity: Activity,
}

#[derive(Deserialize)]
struct ActivitiesPage {
    #[serde(default)]
    activities: Vec<Activity>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: Option<usize>,
}

#[derive(Deserialize)]
struct FollowEnvelope {
    follow: FollowEdge,
}

#[derive(Deserialize)]
struct FollowsPage {
    #[serde(default)]
    follows: Vec<FollowEdge>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct ReactionEnvelope {
    reaction: Reaction,
}

#[derive(Deserialize)]
struct CommentEnvelope {
    comment: Comment,
}

impl HttpFeedService {
    pub fn new(config: HttpFeedServiceConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            token: config.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Helper to attach credentials to every request
    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.query(&[("api_key", self.api_key.as_str())])
            .header("Authorization", &self.token)
            .header("stream-auth-type", "jwt")
    }

    /// Helper to turn a response into a typed value or a classified error
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> FeedResult<T> {
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FeedServiceError::classify(status.as_u16(), &body))
        }
    }

    /// Like `handle_response` for calls whose body we don't read
    async fn expect_success(&self, response: reqwest::Response) -> FeedResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FeedServiceError::classify(status.as_u16(), &body))
        }
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> FeedResult<reqwest::Response> {
        tracing::debug!(path, "POST feed service");
        let req = self.authorized(self.client.post(self.url(path)).json(body));
        Ok(req.send().await?)
    }
}

/// Absolute cutoff timestamp `days` from now, or an error when it overflows
fn cutoff_time(days: i64) -> FeedResult<String> {
    Duration::try_days(days)
        .and_then(|span| Utc::now().checked_add_signed(span))
        .map(|at| at.to_rfc3339())
        .ok_or_else(|| FeedServiceError::Serialization(format!("cutoff of {} days is out of range", days)))
}

fn feed_path(feed: &FeedRef) -> String {
    format!(
        "{}/{}",
        urlencoding::encode(&feed.group),
        urlencoding::encode(&feed.id)
    )
}

#[async_trait]
impl FeedService for HttpFeedService {
    async fn create_feed_group(&self, group: &FeedGroupDef) -> FeedResult<()> {
        let body = FeedGroupBody {
            id: &group.id,
            activity_selectors: &group.activity_selectors,
            ranking: group.ranking.as_ref(),
            notification: group.notification,
            cutoff_time: group.cutoff_days.map(cutoff_time).transpose()?,
        };
        let response = self.post_json("/feed_groups", &body).await?;
        self.expect_success(response).await
    }

    async fn create_feed_view(&self, view: &FeedViewDef) -> FeedResult<()> {
        let response = self.post_json("/feed_views", view).await?;
        self.expect_success(response).await
    }

    async fn upsert_users(&self, users: &[SampleUser]) -> FeedResult<()> {
        let users: BTreeMap<&str, UserBody<'_>> = users
            .iter()
            .map(|u| {
                (
                    u.id.as_str(),
                    UserBody {
                        id: &u.id,
                        name: &u.name,
                        image: u.image.as_deref(),
                    },
                )
            })
            .collect();
        let response = self.post_json("/users", &json!({ "users": users })).await?;
        self.expect_success(response).await
    }

    async fn get_or_create_feed(&self, feed: &FeedRef, options: &FeedOptions) -> FeedResult<()> {
        let path = format!("/feeds/{}", feed_path(feed));
        let response = self.post_json(&path, &json!({ "data": options })).await?;
        self.expect_success(response).await
    }

    async fn add_activity(&self, activity: &NewActivity) -> FeedResult<Activity> {
        let response = self.post_json("/activities", activity).await?;
        let envelope: ActivityEnvelope = self.handle_response(response).await?;
        Ok(envelope.activity)
    }

    async fn query_activities(&self, query: &ActivityQuery) -> FeedResult<Page<Activity>> {
        let mut body = json!({ "limit": query.limit });
        if let Some(next) = &query.next {
            body["next"] = json!(next);
        }
        if let Some(feed) = &query.feed {
            body["filter"] = json!({ "feed": feed.fid() });
        }
        let response = self.post_json("/activities/query", &body).await?;
        let page: ActivitiesPage = self.handle_response(response).await?;
        Ok(Page {
            items: page.activities,
            next: page.next,
        })
    }

    async fn delete_activities(&self, ids: &[String], hard_delete: bool) -> FeedResult<usize> {
        let body = json!({ "ids": ids, "hard_delete": hard_delete });
        let response = self.post_json("/activities/delete", &body).await?;
        let deleted: DeleteResponse = self.handle_response(response).await?;
        Ok(deleted.deleted.unwrap_or(ids.len()))
    }

    async fn follow(&self, source: &FeedRef, target: &FeedRef) -> FeedResult<FollowEdge> {
        let body = json!({ "source": source, "target": target });
        let response = self.post_json("/follows", &body).await?;
        let envelope: FollowEnvelope = self.handle_response(response).await?;
        Ok(envelope.follow)
    }

    async fn query_follows(&self, page: &PageRequest) -> FeedResult<Page<FollowEdge>> {
        let response = self.post_json("/follows/query", page).await?;
        let follows: FollowsPage = self.handle_response(response).await?;
        Ok(Page {
            items: follows.follows,
            next: follows.next,
        })
    }

    async fn unfollow(&self, source: &FeedRef, target: &FeedRef) -> FeedResult<()> {
        let path = format!(
            "/follows/{}/{}",
            urlencoding::encode(&source.fid()),
            urlencoding::encode(&target.fid())
        );
        tracing::debug!(path = %path, "DELETE feed service");
        let req = self.authorized(self.client.delete(self.url(&path)));
        let response = req.send().await?;
        self.expect_success(response).await
    }

    async fn add_reaction(&self, reaction: &NewReaction) -> FeedResult<Reaction> {
        let path = format!("/activities/{}/reactions", urlencoding::encode(&reaction.activity_id));
        let body = json!({ "type": reaction.kind, "user_id": reaction.user_id });
        let response = self.post_json(&path, &body).await?;
        let envelope: ReactionEnvelope = self.handle_response(response).await?;
        Ok(envelope.reaction)
    }

    async fn add_comment(&self, comment: &NewComment) -> FeedResult<Comment> {
        let response = self.post_json("/comments", comment).await?;
        let envelope: CommentEnvelope = self.handle_response(response).await?;
        Ok(envelope.comment)
    }
}
