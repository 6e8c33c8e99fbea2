use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use persona_core::{CoreError, RedditApiError};
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Reddit caps listing pages at 100 items.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditThing<T> {
    pub kind: String,
    pub data: T,
}

pub type RedditListing<T> = RedditThing<RedditListingData<T>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<RedditThing<T>>,
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

impl<T> RedditListingData<T> {
    pub fn new(items: Vec<T>, after: Option<String>) -> Self {
        Self {
            dist: Some(items.len() as u32),
            children: items
                .into_iter()
                .map(|data| RedditThing {
                    kind: "Listing".to_string(),
                    data,
                })
                .collect(),
            after,
            before: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.children.into_iter().map(|child| child.data).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditUserData {
    pub name: String,
    /// Missing for suspended accounts.
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
    #[serde(default)]
    pub icon_img: Option<String>,
    #[serde(default)]
    pub is_suspended: bool,
}

/// A `t1` comment as it appears in a user's comment listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub body: String,
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
    /// Fullname (`t3_...`) of the parent submission.
    pub link_id: String,
    #[serde(default)]
    pub link_title: Option<String>,
    #[serde(default)]
    pub link_permalink: Option<String>,
    pub subreddit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
    pub subreddit: String,
    #[serde(default)]
    pub link_flair_text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub over_18: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditSubredditData {
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub public_description: String,
    #[serde(default)]
    pub over18: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditTrophyData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TrophyListData {
    #[serde(default)]
    trophies: Vec<RedditThing<RedditTrophyData>>,
}

/// Rate-limited, metered HTTP access to the OAuth API. Callers supply the
/// bearer token.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    metrics: MetricsCollector,
    api_base: String,
    page_size: u32,
}

impl RedditApiClient {
    pub fn new(
        user_agent: &str,
        api_base: &str,
        rate_config: RateLimitConfig,
        page_size: u32,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(rate_config),
            metrics: MetricsCollector::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    async fn make_request(
        &self,
        label: &str,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.api_base, endpoint);

        let waited = self.rate_limiter.acquire_permit().await;
        if !waited.is_zero() {
            debug!("Waited {:?} for rate limit permit ({})", waited, endpoint);
        }

        let start_time = Instant::now();
        debug!("Reddit API request: GET {}", endpoint);
        let outcome = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await;

        let (result, status_code) = match outcome {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    (Ok(response), Some(status.as_u16()))
                } else {
                    let err = status_to_error(status, response.headers(), endpoint);
                    warn!("Request failed with status {} for {}", status, endpoint);
                    (Err(CoreError::RedditApi(err)), Some(status.as_u16()))
                }
            }
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                let err = if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                };
                (Err(err), None)
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint: label.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited: status_code == Some(429),
            })
            .await;

        result
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        label: &str,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let response = self
            .make_request(label, endpoint, access_token, query_params)
            .await?;

        response.json().await.map_err(|e| {
            error!("Failed to parse {} response: {}", label, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse {}: {}", endpoint, e),
            })
        })
    }

    fn listing_params(&self, after: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.page_size.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }
        params
    }

    pub async fn get_user_about(
        &self,
        access_token: &str,
        username: &str,
    ) -> Result<RedditUserData, CoreError> {
        let endpoint = format!("/user/{}/about", username);
        let about: RedditThing<RedditUserData> = self
            .get_json("user_about", &endpoint, access_token, &[("raw_json", "1".to_string())])
            .await
            .map_err(|e| not_found_as(e, || RedditApiError::UserNotFound {
                username: username.to_string(),
            }))?;

        debug!("Retrieved profile for u/{}", about.data.name);
        Ok(about.data)
    }

    pub async fn get_user_trophies(
        &self,
        access_token: &str,
        username: &str,
    ) -> Result<Vec<RedditTrophyData>, CoreError> {
        let endpoint = format!("/api/v1/user/{}/trophies", username);
        let list: RedditThing<TrophyListData> = self
            .get_json("user_trophies", &endpoint, access_token, &[])
            .await?;

        Ok(list
            .data
            .trophies
            .into_iter()
            .map(|trophy| trophy.data)
            .collect())
    }

    pub async fn get_user_comments(
        &self,
        access_token: &str,
        username: &str,
        after: Option<&str>,
    ) -> Result<RedditListingData<RedditCommentData>, CoreError> {
        let endpoint = format!("/user/{}/comments", username);
        let listing: RedditListing<RedditCommentData> = self
            .get_json("user_comments", &endpoint, access_token, &self.listing_params(after))
            .await?;

        info!(
            "Retrieved {} comments for u/{}",
            listing.data.children.len(),
            username
        );
        Ok(listing.data)
    }

    pub async fn get_user_submissions(
        &self,
        access_token: &str,
        username: &str,
        after: Option<&str>,
    ) -> Result<RedditListingData<RedditPostData>, CoreError> {
        let endpoint = format!("/user/{}/submitted", username);
        let listing: RedditListing<RedditPostData> = self
            .get_json("user_submitted", &endpoint, access_token, &self.listing_params(after))
            .await?;

        info!(
            "Retrieved {} submissions for u/{}",
            listing.data.children.len(),
            username
        );
        Ok(listing.data)
    }

    /// Look up one submission by fullname (`t3_...`). `None` when Reddit no
    /// longer knows it.
    pub async fn get_submission(
        &self,
        access_token: &str,
        fullname: &str,
    ) -> Result<Option<RedditPostData>, CoreError> {
        let listing: RedditListing<RedditPostData> = self
            .get_json(
                "info",
                "/api/info",
                access_token,
                &[("id", fullname.to_string()), ("raw_json", "1".to_string())],
            )
            .await?;

        Ok(listing.data.into_items().into_iter().next())
    }

    pub async fn get_subreddit_about(
        &self,
        access_token: &str,
        subreddit: &str,
    ) -> Result<RedditSubredditData, CoreError> {
        let endpoint = format!("/r/{}/about", subreddit);
        let about: RedditThing<RedditSubredditData> = self
            .get_json(
                "subreddit_about",
                &endpoint,
                access_token,
                &[("raw_json", "1".to_string())],
            )
            .await
            .map_err(|e| not_found_as(e, || RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            }))?;

        debug!("Retrieved info for r/{}", subreddit);
        Ok(about.data)
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

fn not_found_as(error: CoreError, specific: impl FnOnce() -> RedditApiError) -> CoreError {
    match error {
        CoreError::RedditApi(RedditApiError::NotFound { .. }) => CoreError::RedditApi(specific()),
        other => other,
    }
}

fn retry_after_secs(headers: &HeaderMap) -> u64 {
    ["retry-after", "x-ratelimit-reset"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil().max(1.0) as u64)
        .next()
        .unwrap_or(60)
}

pub(crate) fn status_to_error(
    status: StatusCode,
    headers: &HeaderMap,
    endpoint: &str,
) -> RedditApiError {
    match status.as_u16() {
        429 => RedditApiError::RateLimitExceeded {
            retry_after: retry_after_secs(headers),
        },
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        // Reddit redirects lookups of unknown communities to search
        404 | 300..=399 => RedditApiError::NotFound {
            resource: endpoint.to_string(),
        },
        code => RedditApiError::ServerError { status_code: code },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_status_mapping() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7.2"));
        assert!(matches!(
            status_to_error(StatusCode::TOO_MANY_REQUESTS, &headers, "/x"),
            RedditApiError::RateLimitExceeded { retry_after: 8 }
        ));

        let empty = HeaderMap::new();
        assert!(matches!(
            status_to_error(StatusCode::TOO_MANY_REQUESTS, &empty, "/x"),
            RedditApiError::RateLimitExceeded { retry_after: 60 }
        ));
        assert!(matches!(
            status_to_error(StatusCode::FORBIDDEN, &empty, "/r/private/about"),
            RedditApiError::Forbidden { ref resource } if resource == "/r/private/about"
        ));
        assert!(matches!(
            status_to_error(StatusCode::FOUND, &empty, "/r/nope/about"),
            RedditApiError::NotFound { .. }
        ));
        assert!(matches!(
            status_to_error(StatusCode::BAD_GATEWAY, &empty, "/x"),
            RedditApiError::ServerError { status_code: 502 }
        ));
    }

    #[test]
    fn test_listing_parses_without_optional_fields() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "after": "t1_next",
                "children": [
                    {"kind": "t1", "data": {
                        "id": "c1", "body": "hello", "created_utc": 1700000000.0,
                        "link_id": "t3_p1", "subreddit": "Rust"
                    }}
                ]
            }
        }"#;

        let listing: RedditListing<RedditCommentData> = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t1_next"));
        let items = listing.data.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link_title, None);
        assert_eq!(items[0].subreddit, "Rust");
    }

    #[test]
    fn test_page_size_is_clamped() {
        let client = RedditApiClient::new(
            "test-agent/1.0",
            REDDIT_API_BASE,
            RateLimitConfig::reddit_oauth(),
            500,
        )
        .unwrap();
        assert_eq!(client.page_size, MAX_PAGE_SIZE);

        let params = client.listing_params(Some("t3_abc"));
        assert!(params.contains(&("after", "t3_abc".to_string())));
    }
}
