use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use reelmatch_core::{PostMetadata, ScrapedPost};
use reelmatch_scraper::{
    FetchError, FixturePostSource, PipelineOptions, PostSource, RetryPolicy,
};
use tower::ServiceExt;

use super::*;

fn post(account: &str, shortcode: &str, likes: u64) -> ScrapedPost {
    ScrapedPost {
        account: account.to_owned(),
        shortcode: shortcode.to_owned(),
        url: format!("https://www.instagram.com/reel/{shortcode}/"),
        metadata: PostMetadata {
            likes,
            ..PostMetadata::default()
        },
    }
}

fn test_state() -> AppState {
    let source = FixturePostSource::new()
        .with_posts("nasa", vec![post("nasa", "ABC123", 100), post("nasa", "DEF456", 7)])
        .with_posts("quiet", Vec::new());
    let options = PipelineOptions {
        retry: RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        },
        deadline: None,
        ..PipelineOptions::default()
    };
    AppState::new(
        MatchPipeline::new(Arc::new(source), options),
        CancellationToken::new(),
    )
}

fn test_app() -> Router {
    build_app(test_state(), AuthState::disabled(), default_rate_limit_state())
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

#[tokio::test]
async fn health_reports_healthy_envelope() {
    let (status, json) = send(
        test_app(),
        Request::builder()
            .uri("/v1/health")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "healthy");
    assert!(json["timestamp"].is_string());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/v1/status")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-123"
    );
}

#[tokio::test]
async fn status_reports_pipeline_settings() {
    let (status, json) = send(
        test_app(),
        Request::builder()
            .uri("/v1/status")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "running");
    assert_eq!(json["data"]["post_source"], "fixture");
}

#[tokio::test]
async fn unknown_route_is_404_envelope() {
    let (status, json) = send(
        test_app(),
        Request::builder()
            .uri("/v1/nope")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Endpoint not found");
}

#[tokio::test]
async fn wrong_method_is_405_envelope() {
    let (status, json) = send(
        test_app(),
        Request::builder()
            .uri("/v1/fetch-instagram-post")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"], "Method not allowed");
}

#[tokio::test]
async fn single_account_match_returns_report() {
    let (status, json) = send(
        test_app(),
        post_json(
            "/v1/fetch-instagram-post?max_posts=5",
            &serde_json::json!({
                "username": "nasa",
                "post_links": ["https://instagram.com/reel/ABC123/"]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let data = &json["data"];
    assert_eq!(data["username"], "nasa");
    assert_eq!(data["total_reels_scraped"], 2);
    assert_eq!(data["matched_posts_count"], 1);
    assert_eq!(data["matched_posts"][0]["matched_post_data"]["likes"], 100);
    assert_eq!(
        data["matched_posts"][0]["target_link"],
        "https://instagram.com/reel/ABC123/"
    );
}

#[tokio::test]
async fn single_account_without_posts_is_404() {
    for username in ["quiet", "ghost"] {
        let (status, json) = send(
            test_app(),
            post_json(
                "/v1/fetch-instagram-post",
                &serde_json::json!({"username": username, "post_links": ["reel/A"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "username {username}");
        assert_eq!(
            json["error"],
            format!("No reels found for user '{username}'")
        );
    }
}

#[tokio::test]
async fn single_account_validation_errors_are_400() {
    let (status, json) = send(
        test_app(),
        post_json(
            "/v1/fetch-instagram-post",
            &serde_json::json!({"username": "nasa", "post_links": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn invalid_max_posts_is_400() {
    let (status, _) = send(
        test_app(),
        post_json(
            "/v1/fetch-instagram-post?max_posts=0",
            &serde_json::json!({"username": "nasa", "post_links": ["reel/A"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        test_app(),
        post_json(
            "/v1/fetch-instagram-post?max_posts=lots",
            &serde_json::json!({"username": "nasa", "post_links": ["reel/A"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/fetch-instagram-posts")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, json) = send(test_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn bulk_match_reports_every_account() {
    let (status, json) = send(
        test_app(),
        post_json(
            "/v1/fetch-instagram-posts",
            &serde_json::json!({"accounts": [
                {"account": "nasa", "target_links": ["reel/DEF456", "not-a-url"], "max_posts": 5},
                {"account": "ghost", "target_links": ["reel/X"]}
            ]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["accounts"][0]["username"], "nasa");
    assert_eq!(data["accounts"][0]["matched_posts_count"], 1);
    assert_eq!(data["accounts"][0]["unmatchable_targets"][0], "not-a-url");
    assert_eq!(data["accounts"][1]["fetch_outcome"]["status"], "failed");
    assert_eq!(data["summary"]["accounts_not_found"], 1);
    assert_eq!(data["summary"]["total_matched"], 1);
}

#[tokio::test]
async fn bulk_with_zero_accounts_is_400() {
    let (status, json) = send(
        test_app(),
        post_json("/v1/fetch-instagram-posts", &serde_json::json!({"accounts": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "accounts cannot be empty");
}

#[tokio::test]
async fn protected_routes_require_bearer_token_when_enabled() {
    let auth = AuthState::from_keys("secret", false).expect("auth");
    let app = build_app(test_state(), auth, default_rate_limit_state());
    let body = serde_json::json!({"accounts": [{"account": "nasa", "target_links": ["reel/A"]}]});

    let (status, json) = send(app.clone(), post_json("/v1/fetch-instagram-posts", &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let mut request = post_json("/v1/fetch-instagram-posts", &body);
    request
        .headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app,
        Request::builder()
            .uri("/v1/health")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_rejects_requests_over_the_window() {
    let app = build_app(
        test_state(),
        AuthState::disabled(),
        RateLimitState::new(1, Duration::from_secs(60)),
    );
    let body = serde_json::json!({"accounts": [{"account": "nasa", "target_links": ["reel/A"]}]});

    let (first, _) = send(app.clone(), post_json("/v1/fetch-instagram-posts", &body)).await;
    assert_eq!(first, StatusCode::OK);
    let (second, json) = send(app, post_json("/v1/fetch-instagram-posts", &body)).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"], "rate limit exceeded");
}

struct UnreachableSource;

#[async_trait::async_trait]
impl PostSource for UnreachableSource {
    async fn fetch(&self, account: &str, _max_count: usize) -> Result<Vec<ScrapedPost>, FetchError> {
        Err(FetchError::Blocked {
            account: account.to_owned(),
            reason: "upstream rejected credentials".to_owned(),
        })
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

#[tokio::test]
async fn upstream_failure_on_single_route_is_opaque_500() {
    let pipeline = MatchPipeline::new(Arc::new(UnreachableSource), PipelineOptions::default());
    let app = build_app(
        AppState::new(pipeline, CancellationToken::new()),
        AuthState::disabled(),
        default_rate_limit_state(),
    );

    let (status, json) = send(
        app.clone(),
        post_json(
            "/v1/fetch-instagram-post",
            &serde_json::json!({"username": "nasa", "post_links": ["reel/A"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Internal server error");

    let (status, json) = send(
        app,
        post_json(
            "/v1/fetch-instagram-posts",
            &serde_json::json!({"accounts": [{"account": "nasa", "target_links": ["reel/A"]}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["summary"]["accounts_failed"], 1);
    assert_eq!(
        json["data"]["accounts"][0]["fetch_outcome"]["reason"]["kind"],
        "blocked"
    );
}
