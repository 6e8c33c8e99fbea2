//! Pulls a user's full activity from an [`ActivitySource`].
//!
//! Comments are walked first, then submissions, each page by page until the
//! listing runs out. Every comment and submission adds one interaction to its
//! community. Community metadata and parent submissions are looked up once per
//! distinct key. Lookups that fail for a single item degrade to placeholders
//! and are recorded as [`Degradation`]s; failures of the profile or of a page
//! fetch abort the run.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use persona_core::{
    CommunityInfo, CoreError, Degradable, ErrorRecovery, PostInfo, PostRecord,
    RedditApiError, UserProfile, REDDIT_WEB_BASE,
};
use reddit_client::{
    ActivitySource, RedditCommentData, RedditListingData, RedditPostData, RedditSubredditData,
    RetryConfig, RetryExecutor,
};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    Community,
    Trophies,
    ParentSubmission,
}

/// A lookup that failed and was replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub subject: String,
    pub reason: String,
}

/// Community metadata already looked up, keyed by lowercased name.
///
/// Placeholders for failed lookups are cached too, so a broken community is
/// only asked for once.
#[derive(Debug, Default, Clone)]
pub struct CommunityCache {
    entries: IndexMap<String, CommunityInfo>,
}

impl CommunityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CommunityInfo> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, info: CommunityInfo) {
        self.entries.insert(info.name.clone(), info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A comment before grouping. `parent_id` is the fullname of the submission
/// it was left on.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub parent_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentPost {
    pub post_info: PostInfo,
    pub subreddit: String,
}

/// Everything fetched for one user, in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawActivity {
    pub profile: UserProfile,
    pub comments: Vec<RawComment>,
    /// Parent submissions keyed by fullname, in first-seen order.
    pub parents: IndexMap<String, ParentPost>,
    pub posts: Vec<PostRecord>,
    /// Communities in first-interaction order, with interaction counts.
    pub communities: IndexMap<String, CommunityInfo>,
    pub degradations: Vec<Degradation>,
}

pub(crate) fn timestamp_to_utc(created_utc: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(created_utc.trunc() as i64, 0)
        .single()
        .unwrap_or_default()
}

/// The account name as Reddit spells it, or the requested one when the
/// profile does not carry a name.
fn canonical_username(reported: &str, requested: &str) -> String {
    if reported.is_empty() {
        requested.to_string()
    } else {
        reported.to_string()
    }
}

fn web_url(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{}{}", REDDIT_WEB_BASE, permalink)
    }
}

fn post_info_from(post: &RedditPostData) -> PostInfo {
    PostInfo {
        title: post.title.clone(),
        body: post.selftext.clone(),
        created_at: timestamp_to_utc(post.created_utc),
        reddit_url: web_url(&post.permalink),
        flair: post.link_flair_text.clone(),
    }
}

/// Parent block built from what the comment itself carries about its post.
fn post_info_from_comment(comment: &RedditCommentData) -> PostInfo {
    PostInfo {
        title: comment.link_title.clone().unwrap_or_default(),
        body: String::new(),
        created_at: timestamp_to_utc(comment.created_utc),
        reddit_url: comment
            .link_permalink
            .as_deref()
            .map(web_url)
            .unwrap_or_default(),
        flair: None,
    }
}

fn community_from(name: &str, about: RedditSubredditData) -> CommunityInfo {
    CommunityInfo {
        name: name.to_string(),
        url: CommunityInfo::community_url(&about.display_name),
        title: about.title,
        public_description: about.public_description,
        over_18: Some(about.over18),
        interactions_count: 0,
    }
}

pub struct ActivityAggregator<'a, S> {
    source: &'a S,
    retry: RetryExecutor,
}

impl<'a, S: ActivitySource> ActivityAggregator<'a, S> {
    pub fn new(source: &'a S, retry: RetryConfig) -> Self {
        Self {
            source,
            retry: RetryExecutor::new(retry),
        }
    }

    pub async fn aggregate(
        &self,
        username: &str,
        cache: &mut CommunityCache,
    ) -> Result<RawActivity, CoreError> {
        info!("Collecting activity for u/{}", username);
        let mut degradations = Vec::new();

        let about = self
            .retry
            .execute("fetch user profile", || self.source.user_profile(username))
            .await?;
        let trophies = self.fetch_trophies(username, &mut degradations).await;

        let canonical = canonical_username(&about.name, username);
        let profile = UserProfile {
            profile_url: UserProfile::profile_url_for(&canonical),
            username: canonical,
            created_at: timestamp_to_utc(about.created_utc),
            link_karma: about.link_karma,
            comment_karma: about.comment_karma,
            trophies,
            icon_img: about.icon_img.clone().filter(|icon| !icon.is_empty()),
        };

        let mut interactions: IndexMap<String, u64> = IndexMap::new();

        let raw_comments = self
            .paginate("fetch comments page", |after: Option<String>| async move {
                self.source
                    .user_comments_page(username, after.as_deref())
                    .await
            })
            .await?;

        let mut comments = Vec::with_capacity(raw_comments.len());
        let mut parents: IndexMap<String, ParentPost> = IndexMap::new();
        for comment in raw_comments {
            let community = comment.subreddit.to_lowercase();
            self.ensure_community(&community, cache, &mut degradations)
                .await;
            *interactions.entry(community.clone()).or_insert(0) += 1;

            if !parents.contains_key(&comment.link_id) {
                let post_info = self.parent_post(&comment, &mut degradations).await?;
                parents.insert(
                    comment.link_id.clone(),
                    ParentPost {
                        post_info,
                        subreddit: community,
                    },
                );
            }

            comments.push(RawComment {
                parent_id: comment.link_id,
                created_at: timestamp_to_utc(comment.created_utc),
                url: web_url(&comment.permalink),
                body: comment.body,
            });
        }

        let submissions = self
            .paginate("fetch submissions page", |after: Option<String>| async move {
                self.source
                    .user_submissions_page(username, after.as_deref())
                    .await
            })
            .await?;

        let mut posts = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let community = submission.subreddit.to_lowercase();
            self.ensure_community(&community, cache, &mut degradations)
                .await;
            *interactions.entry(community.clone()).or_insert(0) += 1;

            posts.push(PostRecord {
                post_info: post_info_from(&submission),
                subreddit: community,
                emotions: None,
            });
        }

        let communities = interactions
            .into_iter()
            .map(|(name, count)| {
                let mut info = cache
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| CommunityInfo::placeholder(&name));
                info.interactions_count = count;
                (name, info)
            })
            .collect::<IndexMap<_, _>>();

        info!(
            "Collected {} comments and {} posts across {} communities for u/{} ({} degraded lookups)",
            comments.len(),
            posts.len(),
            communities.len(),
            username,
            degradations.len()
        );
        let retries = self.retry.get_metrics();
        if retries.total_retries > 0 {
            info!(
                "Retried {} Reddit calls ({} recovered, {} gave up)",
                retries.total_retries, retries.successful_retries, retries.failed_operations
            );
        }

        Ok(RawActivity {
            profile,
            comments,
            parents,
            posts,
            communities,
            degradations,
        })
    }

    /// Follow `after` cursors until the listing is exhausted.
    async fn paginate<T, F, Fut>(&self, operation: &str, fetch: F) -> Result<Vec<T>, CoreError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<RedditListingData<T>, CoreError>>,
    {
        let mut items = Vec::new();
        let mut after: Option<String> = None;
        let mut page_number = 0usize;

        loop {
            let page = self
                .retry
                .execute(operation, || fetch(after.clone()))
                .await?;
            page_number += 1;

            if page.is_empty() {
                break;
            }
            let next = page.after.clone();
            items.extend(page.into_items());
            debug!("{}: page {} ({} items so far)", operation, page_number, items.len());

            match next {
                Some(next) if Some(&next) != after.as_ref() => after = Some(next),
                Some(next) => {
                    warn!("{}: cursor {} repeated, stopping", operation, next);
                    break;
                }
                None => break,
            }
        }

        Ok(items)
    }

    async fn fetch_trophies(&self, username: &str, degradations: &mut Vec<Degradation>) -> Vec<String> {
        let result = ErrorRecovery::recover_or_degrade(
            || self.source.user_trophies(username),
            Vec::new,
        )
        .await;

        match result {
            Degradable::Recovered(trophies) => {
                trophies.into_iter().map(|trophy| trophy.name).collect()
            }
            Degradable::Degraded { reason, .. } => {
                warn!("Trophies for u/{} unavailable: {}", username, reason);
                degradations.push(Degradation {
                    kind: DegradationKind::Trophies,
                    subject: username.to_string(),
                    reason,
                });
                Vec::new()
            }
        }
    }

    async fn ensure_community(
        &self,
        name: &str,
        cache: &mut CommunityCache,
        degradations: &mut Vec<Degradation>,
    ) {
        if cache.contains(name) {
            return;
        }

        let result = ErrorRecovery::recover_or_degrade(
            || self.source.subreddit_about(name),
            RedditSubredditData::default,
        )
        .await;

        let info = match result {
            Degradable::Recovered(about) => community_from(name, about),
            Degradable::Degraded { reason, .. } => {
                warn!("Community r/{} unavailable, using placeholder: {}", name, reason);
                degradations.push(Degradation {
                    kind: DegradationKind::Community,
                    subject: name.to_string(),
                    reason,
                });
                CommunityInfo::placeholder(name)
            }
        };
        cache.insert(info);
    }

    /// The submission a comment was left on. Deleted or inaccessible parents
    /// degrade to the title and link the comment carries; a fetch that keeps
    /// failing is fatal.
    async fn parent_post(
        &self,
        comment: &RedditCommentData,
        degradations: &mut Vec<Degradation>,
    ) -> Result<PostInfo, CoreError> {
        let fetched = self
            .retry
            .execute("fetch parent submission", || {
                self.source.submission(&comment.link_id)
            })
            .await;

        let reason = match fetched {
            Ok(Some(post)) => return Ok(post_info_from(&post)),
            Ok(None) => "submission no longer exists".to_string(),
            Err(CoreError::RedditApi(
                e @ (RedditApiError::Forbidden { .. } | RedditApiError::NotFound { .. }),
            )) => e.to_string(),
            Err(e) => return Err(e),
        };

        warn!("Parent {} unavailable: {}", comment.link_id, reason);
        degradations.push(Degradation {
            kind: DegradationKind::ParentSubmission,
            subject: comment.link_id.clone(),
            reason,
        });
        Ok(post_info_from_comment(comment))
    }
}
