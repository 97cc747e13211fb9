mod posts;

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use reelmatch_scraper::MatchPipeline;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState,
};

const SERVICE_NAME: &str = "reelmatch";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: MatchPipeline,
    /// Cancelled on shutdown; every in-flight pipeline run observes it.
    pub shutdown: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: MatchPipeline, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            shutdown,
            started_at: Utc::now(),
        }
    }
}

/// Response envelope shared by every route.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            timestamp: Utc::now(),
            data: Some(data),
            error: None,
        })
    }
}

/// Error response rendered as a failed [`Envelope`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Opaque 500; details belong in the log, not the response.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Envelope::<()> {
            success: false,
            timestamp: Utc::now(),
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/v1/fetch-instagram-post", post(posts::fetch_single))
        .route("/v1/fetch-instagram-posts", post(posts::fetch_bulk))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/", get(index))
        .route("/v1/health", get(health))
        .route("/v1/status", get(status));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .fallback(endpoint_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(build_cors()),
        )
        .with_state(state)
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn index() -> impl IntoResponse {
    Envelope::ok(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "fetch_post": "POST /v1/fetch-instagram-post",
            "fetch_posts": "POST /v1/fetch-instagram-posts",
            "health": "GET /v1/health",
            "status": "GET /v1/status",
        },
    }))
}

async fn health() -> impl IntoResponse {
    Envelope::ok(json!({"status": "healthy", "service": SERVICE_NAME}))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let options = state.pipeline.options();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0);
    Envelope::ok(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": if state.shutdown.is_cancelled() { "shutting_down" } else { "running" },
        "uptime_secs": uptime_secs,
        "post_source": state.pipeline.source_name(),
        "max_workers": options.worker_budget,
        "max_retries": options.retry.max_retries,
        "default_max_posts": options.default_max_posts,
        "endpoints": {
            "fetch_post": "/v1/fetch-instagram-post",
            "fetch_posts": "/v1/fetch-instagram-posts",
            "health": "/v1/health",
            "status": "/v1/status",
        },
    }))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
