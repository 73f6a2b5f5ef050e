use std::sync::Arc;

use super::error::SeedError;
use super::topology::TopologyProvisioner;
use crate::config::Roster;
use crate::feeds::FeedService;
use crate::hashtag::extract_hashtags;
use feedline_types::*;

/// Limits and fixed text used when decorating seeded posts
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Number of leading activities that get a like
    pub reaction_limit: usize,
    /// Number of leading activities that get a comment
    pub comment_limit: usize,
    pub comment_text: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            reaction_limit: 3,
            comment_limit: 2,
            comment_text: "Welcome aboard! Great to see you here.".to_string(),
        }
    }
}

/// Outcome of one per-user stage, consumed by `SeedEngine::seed_user`
#[derive(Debug)]
enum Transition {
    Continue,
    /// Record the failure, then carry on with the next stage
    SkipStep(String),
    /// Record the failure and leave this user
    SkipUser(String),
}

/// Progress of a single sample user through the per-user stages
struct UserProgress<'a> {
    user: &'a SampleUser,
    targets: Vec<FeedRef>,
    activity_id: Option<String>,
    /// Position of this user's activity among those created in this run
    created_index: Option<usize>,
}

/// Bookkeeping for one seed run
struct SeedRun<'a> {
    acting_user_id: &'a str,
    stage: SeedStage,
    summary: SeedSummary,
}

impl<'a> SeedRun<'a> {
    fn new(acting_user_id: &'a str) -> Self {
        Self {
            acting_user_id,
            stage: SeedStage::NotStarted,
            summary: SeedSummary::default(),
        }
    }

    fn advance(&mut self, to: SeedStage) {
        debug_assert!(to >= self.stage, "seed stages only move forward");
        tracing::debug!(from = self.stage.as_str(), to = to.as_str(), "Seed stage");
        self.stage = to;
    }

    fn record_failure(&mut self, user_id: &str, stage: SeedStage, message: String) {
        debug_assert!(stage.is_best_effort(), "fatal stages never record a failure");
        tracing::warn!(user_id, stage = stage.as_str(), error = %message, "Seed step skipped");
        self.summary.failures.push(SeedFailure {
            user_id: Some(user_id.to_string()),
            stage,
            message,
        });
    }
}

fn next_user_stage(stage: SeedStage) -> SeedStage {
    match stage {
        SeedStage::UserFeedsEnsuring => SeedStage::HashtagFeedsEnsuring,
        SeedStage::HashtagFeedsEnsuring => SeedStage::ActivitiesCreating,
        SeedStage::ActivitiesCreating => SeedStage::ReactionsAttaching,
        SeedStage::ReactionsAttaching => SeedStage::CommentsAttaching,
        _ => SeedStage::Completed,
    }
}

/// Populates the feed graph with the sample roster and their posts
pub struct SeedEngine {
    feeds: Arc<dyn FeedService>,
    provisioner: Arc<TopologyProvisioner>,
    roster: Roster,
    options: SeedOptions,
}

impl SeedEngine {
    pub fn new(
        feeds: Arc<dyn FeedService>,
        provisioner: Arc<TopologyProvisioner>,
        roster: Roster,
        options: SeedOptions,
    ) -> Self {
        Self {
            feeds,
            provisioner,
            roster,
            options,
        }
    }

    /// Seed the roster, their posts and a few interactions.
    ///
    /// Upserting users and ensuring the topology are fatal gates. Everything
    /// after them is best effort: failures land in `SeedSummary::failures`.
    pub async fn seed_feeds(&self, acting_user_id: &str) -> Result<SeedSummary, SeedError> {
        tracing::info!(
            acting_user_id,
            users = self.roster.users.len(),
            "Seeding feeds"
        );
        let mut run = SeedRun::new(acting_user_id);
        run.summary.user_ids = self.roster.users.iter().map(|u| u.id.clone()).collect();

        self.feeds
            .upsert_users(&self.roster.users)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to upsert sample users");
                SeedError::UpsertUsers(e)
            })?;
        run.advance(SeedStage::UsersUpserted);

        self.provisioner.ensure_topology().await?;
        run.advance(SeedStage::TopologyEnsured);

        for user in &self.roster.users {
            run.summary.users_attempted += 1;
            self.seed_user(user, &mut run).await;
        }

        run.advance(SeedStage::Completed);
        run.summary.success = true;

        tracing::info!(
            activities = run.summary.activity_ids.len(),
            attempted = run.summary.users_attempted,
            reactions = run.summary.reactions_added,
            comments = run.summary.comments_added,
            failures = run.summary.failures.len(),
            "Seeding complete"
        );
        Ok(run.summary)
    }

    /// Drive one user through the per-user stages
    async fn seed_user(&self, user: &SampleUser, run: &mut SeedRun<'_>) {
        let mut progress = UserProgress {
            user,
            targets: vec![FeedRef::user(&user.id)],
            activity_id: None,
            created_index: None,
        };

        let mut stage = SeedStage::UserFeedsEnsuring;
        while stage != SeedStage::Completed {
            run.stage = stage;
            let transition = match stage {
                SeedStage::UserFeedsEnsuring => self.ensure_user_feed(&progress).await,
                SeedStage::HashtagFeedsEnsuring => self.ensure_hashtag_feeds(&mut progress, run).await,
                SeedStage::ActivitiesCreating => self.create_activity(&mut progress, run).await,
                SeedStage::ReactionsAttaching => self.attach_reaction(&progress, run).await,
                SeedStage::CommentsAttaching => self.attach_comment(&progress, run).await,
                _ => Transition::Continue,
            };

            match transition {
                Transition::Continue => {}
                Transition::SkipStep(message) => run.record_failure(&user.id, stage, message),
                Transition::SkipUser(message) => {
                    run.record_failure(&user.id, stage, message);
                    return;
                }
            }
            stage = next_user_stage(stage);
        }
    }

    async fn ensure_user_feed(&self, progress: &UserProgress<'_>) -> Transition {
        let feed = FeedRef::user(&progress.user.id);
        let options = FeedOptions::public_owned_by(&progress.user.id);
        match self.feeds.get_or_create_feed(&feed, &options).await {
            Ok(()) => Transition::Continue,
            Err(e) => Transition::SkipStep(format!("user feed {}: {}", feed, e)),
        }
    }

    async fn ensure_hashtag_feeds(&self, progress: &mut UserProgress<'_>, run: &mut SeedRun<'_>) -> Transition {
        let options = FeedOptions::public_owned_by(&progress.user.id);
        let mut failed = Vec::new();

        for token in extract_hashtags(&progress.user.post) {
            let feed = FeedRef::hashtag(token);
            match self.feeds.get_or_create_feed(&feed, &options).await {
                Ok(()) => {
                    let fid = feed.fid();
                    if !run.summary.hashtag_feeds.contains(&fid) {
                        run.summary.hashtag_feeds.push(fid);
                    }
                    progress.targets.push(feed);
                }
                Err(e) => failed.push(format!("{}: {}", feed, e)),
            }
        }

        if failed.is_empty() {
            Transition::Continue
        } else {
            Transition::SkipStep(format!("hashtag feeds left out: {}", failed.join("; ")))
        }
    }

    async fn create_activity(&self, progress: &mut UserProgress<'_>, run: &mut SeedRun<'_>) -> Transition {
        let activity = NewActivity {
            user_id: progress.user.id.clone(),
            kind: ActivityKind::Post,
            feeds: progress.targets.clone(),
            text: progress.user.post.clone(),
        };

        match self.feeds.add_activity(&activity).await {
            Ok(created) => {
                tracing::info!(
                    user_id = %progress.user.id,
                    activity_id = %created.id,
                    feeds = progress.targets.len(),
                    "Created activity"
                );
                progress.created_index = Some(run.summary.activity_ids.len());
                run.summary.activity_ids.push(created.id.clone());
                progress.activity_id = Some(created.id);
                Transition::Continue
            }
            Err(e) => Transition::SkipUser(format!("activity not created: {}", e)),
        }
    }

    async fn attach_reaction(&self, progress: &UserProgress<'_>, run: &mut SeedRun<'_>) -> Transition {
        let (Some(activity_id), Some(index)) = (&progress.activity_id, progress.created_index) else {
            return Transition::Continue;
        };
        if index >= self.options.reaction_limit {
            return Transition::Continue;
        }

        let reaction = NewReaction {
            activity_id: activity_id.clone(),
            kind: ReactionKind::Like,
            user_id: run.acting_user_id.to_string(),
        };
        match self.feeds.add_reaction(&reaction).await {
            Ok(_) => {
                run.summary.reactions_added += 1;
                Transition::Continue
            }
            Err(e) => Transition::SkipStep(format!("like on {}: {}", activity_id, e)),
        }
    }

    async fn attach_comment(&self, progress: &UserProgress<'_>, run: &mut SeedRun<'_>) -> Transition {
        let (Some(activity_id), Some(index)) = (&progress.activity_id, progress.created_index) else {
            return Transition::Continue;
        };
        if index >= self.options.comment_limit {
            return Transition::Continue;
        }

        let comment = NewComment::on_activity(activity_id.clone(), &self.options.comment_text, run.acting_user_id);
        match self.feeds.add_comment(&comment).await {
            Ok(_) => {
                run.summary.comments_added += 1;
                Transition::Continue
            }
            Err(e) => Transition::SkipStep(format!("comment on {}: {}", activity_id, e)),
        }
    }
}
