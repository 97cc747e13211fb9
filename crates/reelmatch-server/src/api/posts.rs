use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use reelmatch_scraper::{
    AccountReport, BulkMatchRequest, FailureReason, FetchOutcome, PipelineError,
    SingleMatchRequest,
};
use serde::Deserialize;

use super::{ApiError, AppState, Envelope};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct MaxPostsQuery {
    max_posts: Option<i64>,
}

fn map_pipeline_error(req_id: &RequestId, err: &PipelineError) -> ApiError {
    match err {
        PipelineError::Validation(e) => {
            tracing::info!(request_id = %req_id.0, error = %e, "rejected invalid request");
            ApiError::bad_request(e.to_string())
        }
    }
}

fn body_error(rejection: &JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
}

/// Single-account lookup. Reports 404 when the account produced no posts
/// and an opaque 500 when the upstream source failed.
pub(super) async fn fetch_single(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<MaxPostsQuery>, QueryRejection>,
    payload: Result<Json<SingleMatchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let Json(request) = payload.map_err(|e| body_error(&e))?;
    let username = request.username.trim().to_owned();

    tracing::info!(
        request_id = %req_id.0,
        account = %username,
        target_links = request.post_links.len(),
        "single-account match requested"
    );

    let bulk = request.into_bulk(query.max_posts);
    let report = state
        .pipeline
        .run(&bulk, &state.shutdown)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;

    let account: AccountReport = report.accounts.into_iter().next().ok_or_else(|| {
        tracing::error!(request_id = %req_id.0, "pipeline returned no account report");
        ApiError::internal()
    })?;

    match account.fetch_outcome.clone() {
        FetchOutcome::Ok => Ok(Envelope::ok(account)),
        FetchOutcome::Empty | FetchOutcome::Failed(FailureReason::NotFound) => Err(
            ApiError::not_found(format!("No reels found for user '{}'", account.username)),
        ),
        FetchOutcome::Failed(reason) => {
            tracing::error!(
                request_id = %req_id.0,
                account = %account.username,
                attempts = account.attempts,
                reason = ?reason,
                "post fetch failed"
            );
            Err(ApiError::internal())
        }
    }
}

/// Multi-account lookup. Per-account failures are reported in the body.
pub(super) async fn fetch_bulk(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<BulkMatchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| body_error(&e))?;

    tracing::info!(
        request_id = %req_id.0,
        accounts = request.accounts.len(),
        "bulk match requested"
    );

    let report = state
        .pipeline
        .run(&request, &state.shutdown)
        .await
        .map_err(|e| map_pipeline_error(&req_id, &e))?;

    Ok(Envelope::ok(report))
}
