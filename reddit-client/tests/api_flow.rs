use persona_core::{CoreError, RedditApiError};
use reddit_client::{ActivitySource, RateLimitConfig, RedditClient, RedditOAuth2Config};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "test-token",
        "token_type": "bearer",
        "expires_in": 86400,
        "scope": "*"
    })
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> RedditClient {
    let config = RedditOAuth2Config::new(
        "id".to_string(),
        "secret".to_string(),
        "reddit-persona-tests/0.1".to_string(),
    )
    .with_endpoints(
        format!("{}/api/v1/access_token", server.uri()),
        server.uri(),
    );
    RedditClient::new(config, RateLimitConfig::per_minute(6000, 100), 100).unwrap()
}

#[tokio::test]
async fn test_profile_fetch_reuses_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/Spez_Fan/about"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "t2",
            "data": {
                "name": "Spez_Fan",
                "created_utc": 1500000000.0,
                "link_karma": 1200,
                "comment_karma": 3400,
                "icon_img": "https://styles.redditmedia.com/icon.png"
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/user/Spez_Fan/trophies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "TrophyList",
            "data": {"trophies": [
                {"kind": "t6", "data": {"name": "Five-Year Club", "description": null}},
                {"kind": "t6", "data": {"name": "Verified Email"}}
            ]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let profile = client.user_profile("Spez_Fan").await.unwrap();
    assert_eq!(profile.name, "Spez_Fan");
    assert_eq!(profile.link_karma, 1200);

    let trophies = client.user_trophies("Spez_Fan").await.unwrap();
    let names: Vec<_> = trophies.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Five-Year Club", "Verified Email"]);

    let metrics = client.api().get_metrics().await;
    assert_eq!(metrics.total_requests, 2);
}

#[tokio::test]
async fn test_comment_pages_pass_cursor() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/someone/comments"))
        .and(query_param("after", "t1_first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"after": null, "children": [
                {"kind": "t1", "data": {
                    "id": "c2", "body": "second page", "created_utc": 1700000100.0,
                    "link_id": "t3_p2", "subreddit": "rust"
                }}
            ]}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/someone/comments"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"after": "t1_first", "children": [
                {"kind": "t1", "data": {
                    "id": "c1", "body": "first page", "created_utc": 1700000000.0,
                    "link_id": "t3_p1", "link_title": "Hello", "subreddit": "Rust"
                }}
            ]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.user_comments_page("someone", None).await.unwrap();
    assert_eq!(first.after.as_deref(), Some("t1_first"));

    let second = client
        .user_comments_page("someone", first.after.as_deref())
        .await
        .unwrap();
    assert!(second.after.is_none());
    assert_eq!(second.into_items()[0].body, "second page");
}

#[tokio::test]
async fn test_missing_user_and_banned_subreddit() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/ghost/about"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": 404})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/banned/about"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"reason": "banned", "error": 404})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/secret/about"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"reason": "private"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.user_profile("ghost").await,
        Err(CoreError::RedditApi(RedditApiError::UserNotFound { ref username })) if username == "ghost"
    ));
    assert!(matches!(
        client.subreddit_about("banned").await,
        Err(CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }))
    ));
    assert!(matches!(
        client.subreddit_about("secret").await,
        Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
    ));
}

#[tokio::test]
async fn test_deleted_submission_is_none() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/info"))
        .and(query_param("id", "t3_gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"after": null, "children": []}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.submission("t3_gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/r/rust/about"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/rust/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "t5",
            "data": {
                "display_name": "rust",
                "title": "The Rust Programming Language",
                "public_description": "A place for all things Rust",
                "over18": false,
                "url": "/r/rust/"
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let about = client.subreddit_about("rust").await.unwrap();
    assert_eq!(about.title, "The Rust Programming Language");
}

#[tokio::test]
async fn test_rate_limit_response_carries_retry_after() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/busy/submitted"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.user_submissions_page("busy", None).await,
        Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 12 }))
    ));

    let metrics = client.api().get_metrics().await;
    assert_eq!(metrics.rate_limited_requests, 1);
}

#[tokio::test]
async fn test_bad_credentials_fail_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized", "error": 401})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.user_profile("anyone").await,
        Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. }))
    ));
}
