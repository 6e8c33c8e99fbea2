use crate::api::{
    RedditCommentData, RedditListingData, RedditPostData, RedditSubredditData, RedditTrophyData,
    RedditUserData,
};
use persona_core::CoreError;

/// Everything the collector needs from Reddit. One call per request, no
/// retries; callers decide how to recover.
pub trait ActivitySource {
    async fn user_profile(&self, username: &str) -> Result<RedditUserData, CoreError>;

    async fn user_trophies(&self, username: &str) -> Result<Vec<RedditTrophyData>, CoreError>;

    /// One page of the user's comments, newest first. `after` is the cursor
    /// returned by the previous page.
    async fn user_comments_page(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<RedditListingData<RedditCommentData>, CoreError>;

    async fn user_submissions_page(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<RedditListingData<RedditPostData>, CoreError>;

    /// Parent submission by fullname; `None` if it no longer exists.
    async fn submission(&self, fullname: &str) -> Result<Option<RedditPostData>, CoreError>;

    async fn subreddit_about(&self, name: &str) -> Result<RedditSubredditData, CoreError>;
}
