pub mod api;
pub mod auth;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;
pub mod source;


pub use api::{
    RedditApiClient, RedditCommentData, RedditListing, RedditListingData, RedditPostData,
    RedditSubredditData, RedditThing, RedditTrophyData, RedditUserData, REDDIT_API_BASE,
};
pub use auth::{AuthState, Authenticator, RedditOAuth2Config, RedditToken, REDDIT_TOKEN_URL};
pub use metrics::{ApiMetrics, MetricsCollector};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor};
pub use source::ActivitySource;

use persona_core::{AppConfig, CoreError, RedditApiError};
use std::future::Future;
use tracing::warn;

/// Authenticated Reddit access: application-only OAuth on top of the
/// rate-limited [`RedditApiClient`].
#[derive(Debug)]
pub struct RedditClient {
    auth: Authenticator,
    api: RedditApiClient,
}

impl RedditClient {
    pub fn new(
        config: RedditOAuth2Config,
        rate_config: RateLimitConfig,
        page_size: u32,
    ) -> Result<Self, CoreError> {
        let auth = Authenticator::new(&config)?;
        let api = RedditApiClient::new(&config.user_agent, &config.api_base, rate_config, page_size)?;
        Ok(Self { auth, api })
    }

    /// Build a client from application settings. Fails when credentials are
    /// missing.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, CoreError> {
        let (client_id, client_secret) = config.reddit_credentials()?;
        let oauth = RedditOAuth2Config::new(client_id, client_secret, config.reddit.user_agent.clone());
        let rate_config =
            RateLimitConfig::per_minute(config.reddit.requests_per_minute, config.reddit.burst);
        Self::new(oauth, rate_config, config.reddit.page_size)
    }

    pub async fn auth_state(&self) -> AuthState {
        self.auth.state().await
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    /// Run a request with a bearer token. A rejected token is discarded and
    /// the request repeated once with a fresh one.
    async fn authorized<T, F, Fut>(&self, request: F) -> Result<T, CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let token = self.auth.access_token().await?;
        match request(token).await {
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Reddit rejected the access token, re-authenticating");
                self.auth.invalidate().await;
                let token = self.auth.access_token().await?;
                request(token).await
            }
            other => other,
        }
    }
}

impl ActivitySource for RedditClient {
    async fn user_profile(&self, username: &str) -> Result<RedditUserData, CoreError> {
        self.authorized(|token| async move { self.api.get_user_about(&token, username).await })
            .await
    }

    async fn user_trophies(&self, username: &str) -> Result<Vec<RedditTrophyData>, CoreError> {
        self.authorized(|token| async move { self.api.get_user_trophies(&token, username).await })
            .await
    }

    async fn user_comments_page(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<RedditListingData<RedditCommentData>, CoreError> {
        self.authorized(|token| async move {
            self.api.get_user_comments(&token, username, after).await
        })
        .await
    }

    async fn user_submissions_page(
        &self,
        username: &str,
        after: Option<&str>,
    ) -> Result<RedditListingData<RedditPostData>, CoreError> {
        self.authorized(|token| async move {
            self.api.get_user_submissions(&token, username, after).await
        })
        .await
    }

    async fn submission(&self, fullname: &str) -> Result<Option<RedditPostData>, CoreError> {
        self.authorized(|token| async move { self.api.get_submission(&token, fullname).await })
            .await
    }

    async fn subreddit_about(&self, name: &str) -> Result<RedditSubredditData, CoreError> {
        self.authorized(|token| async move { self.api.get_subreddit_about(&token, name).await })
            .await
    }
}
