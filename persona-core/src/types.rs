use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

/// Emotion label → score, in the order the classifier reported them.
pub type EmotionScores = IndexMap<String, f64>;

/// Trait name → score as returned by a trait classifier.
pub type TraitScores = IndexMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub link_karma: i64,
    pub comment_karma: i64,
    #[serde(default)]
    pub trophies: Vec<String>,
    pub icon_img: Option<String>,
    pub profile_url: String,
}

impl UserProfile {
    pub fn profile_url_for(username: &str) -> String {
        format!("{}/user/{}", REDDIT_WEB_BASE, username)
    }
}

/// Metadata for one community, keyed by its lowercased name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityInfo {
    pub name: String,
    pub title: String,
    pub public_description: String,
    /// `None` when the community could not be looked up.
    pub over_18: Option<bool>,
    pub url: String,
    #[serde(default)]
    pub interactions_count: u64,
}

impl CommunityInfo {
    pub fn community_url(name: &str) -> String {
        format!("{}/r/{}", REDDIT_WEB_BASE, name)
    }

    /// Stand-in used when a community is banned, quarantined, private or gone.
    pub fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            public_description: String::new(),
            over_18: None,
            url: Self::community_url(name),
            interactions_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostInfo {
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub reddit_url: String,
    pub flair: Option<String>,
}

impl PostInfo {
    /// Text handed to per-item classifiers: the body, or the title for link posts.
    pub fn classifier_text(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.title
        } else {
            &self.body
        }
    }
}

/// A submission authored by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_info: PostInfo,
    pub subreddit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<EmotionScores>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<EmotionScores>,
}

/// The user's comments on one post, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentGroup {
    pub post_info: PostInfo,
    pub subreddit: String,
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_posts: usize,
    pub total_comments: usize,
    pub unique_subreddits: usize,
    pub most_active_subreddit: Option<String>,
    pub account_age_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub user_info: UserProfile,
    pub summary: SummaryStats,
    pub subreddits_master: IndexMap<String, CommunityInfo>,
    pub comments: Vec<CommentGroup>,
    pub posts: Vec<PostRecord>,
}

impl ExportDocument {
    pub fn username(&self) -> &str {
        &self.user_info.username
    }

    pub fn interactions_for(&self, community: &str) -> u64 {
        self.subreddits_master
            .get(community)
            .map(|info| info.interactions_count)
            .unwrap_or(0)
    }

    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(|group| group.comments.len()).sum()
    }

    /// All post and comment bodies joined by single spaces.
    pub fn combined_text(&self) -> String {
        let bodies = self
            .posts
            .iter()
            .map(|post| post.post_info.body.as_str())
            .chain(
                self.comments
                    .iter()
                    .flat_map(|group| group.comments.iter().map(|c| c.body.as_str())),
            );

        let mut text = String::new();
        for body in bodies {
            text.push_str(body);
            text.push(' ');
        }
        text.trim().to_string()
    }
}
