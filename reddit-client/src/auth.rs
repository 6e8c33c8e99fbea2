use crate::api::REDDIT_API_BASE;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    TokenResponse, TokenUrl,
};
use persona_core::{CoreError, RedditApiError};
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

/// Tokens are refreshed this long before Reddit says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub token_url: String,
    pub api_base: String,
}

impl RedditOAuth2Config {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
            token_url: REDDIT_TOKEN_URL.to_string(),
            api_base: REDDIT_API_BASE.to_string(),
        }
    }

    /// Point the client at different token and API hosts.
    pub fn with_endpoints(mut self, token_url: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: Option<SystemTime>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => SystemTime::now() + EXPIRY_MARGIN >= expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated(RedditToken),
    Failed { reason: String },
}

/// Application-only OAuth2 (client credentials grant). Read-only access to
/// public data, no user login involved.
#[derive(Debug)]
pub struct Authenticator {
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    state: RwLock<AuthState>,
}

impl Authenticator {
    pub fn new(config: &RedditOAuth2Config) -> Result<Self, CoreError> {
        let invalid_url = |e: oauth2::url::ParseError| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("invalid OAuth endpoint: {}", e),
            })
        };

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(invalid_url)?,
            Some(TokenUrl::new(config.token_url.clone()).map_err(invalid_url)?),
        );

        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            oauth_client,
            http_client,
            state: RwLock::new(AuthState::NotAuthenticated),
        })
    }

    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// A valid bearer token, requesting a new one when none is cached or the
    /// cached one is about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let AuthState::Authenticated(token) = &*self.state.read().await {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let mut state = self.state.write().await;
        // Another task may have refreshed while we waited for the lock
        if let AuthState::Authenticated(token) = &*state {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        match self.request_token().await {
            Ok(token) => {
                let access_token = token.access_token.clone();
                *state = AuthState::Authenticated(token);
                Ok(access_token)
            }
            Err(e) => {
                *state = AuthState::Failed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Drop the cached token after the API rejected it.
    pub async fn invalidate(&self) {
        warn!("Discarding rejected Reddit access token");
        *self.state.write().await = AuthState::NotAuthenticated;
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        debug!("Requesting application-only Reddit token");
        let http_client = self.http_client.clone();
        let response = self
            .oauth_client
            .exchange_client_credentials()
            .request_async(|request| send_token_request(http_client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::Request(e) => CoreError::Network(e),
                RequestTokenError::ServerResponse(response) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: response.to_string(),
                    })
                }
                RequestTokenError::Parse(e, _) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: format!("unexpected token response: {}", e),
                    })
                }
                RequestTokenError::Other(reason) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
                }
            })?;

        let expires_at = response
            .expires_in()
            .map(|expires_in| SystemTime::now() + expires_in);
        info!("Authenticated with Reddit (expires in {:?})", response.expires_in());

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at,
        })
    }
}

/// Sends the token request with our own client so Reddit sees the configured
/// User-Agent.
async fn send_token_request(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
