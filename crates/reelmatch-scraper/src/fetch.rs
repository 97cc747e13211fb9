//! Per-account fetch task: one source call per attempt, retried per
//! [`RetryPolicy`], never failing outward.

use std::time::Duration;

use reelmatch_core::ScrapedPost;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::retry::{AttemptOutcome, RetryPolicy, RetryState};
use crate::source::PostSource;

/// Why an account produced no usable posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    Transient(String),
    Blocked(String),
    InvalidResponse(String),
    /// The last attempt exceeded the per-attempt timeout.
    Timeout,
    Cancelled,
    /// The fetch task itself crashed.
    Internal(String),
    /// No result was recorded for a requested account.
    Unknown,
}

impl From<FetchError> for FailureReason {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound { .. } => FailureReason::NotFound,
            FetchError::Transient { reason, .. } => FailureReason::Transient(reason),
            FetchError::Blocked { reason, .. } => FailureReason::Blocked(reason),
            FetchError::InvalidResponse { reason, .. } => FailureReason::InvalidResponse(reason),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotFound => f.write_str("account not found"),
            FailureReason::Transient(reason) => write!(f, "transient: {reason}"),
            FailureReason::Blocked(reason) => write!(f, "blocked: {reason}"),
            FailureReason::InvalidResponse(reason) => write!(f, "invalid response: {reason}"),
            FailureReason::Timeout => f.write_str("timed out"),
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::Internal(reason) => write!(f, "internal error: {reason}"),
            FailureReason::Unknown => f.write_str("no result recorded"),
        }
    }
}

/// Terminal status of one account's fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FetchOutcome {
    Ok,
    /// The source answered with zero posts.
    Empty,
    Failed(FailureReason),
}

impl FetchOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Everything the fetch task learned about one account.
#[derive(Debug, Clone)]
pub struct AccountFetchResult {
    pub account: String,
    /// Newest first; empty unless `outcome` is [`FetchOutcome::Ok`].
    pub posts: Vec<ScrapedPost>,
    pub outcome: FetchOutcome,
    /// Source calls made, including the failed ones.
    pub attempts: u32,
}

impl AccountFetchResult {
    #[must_use]
    pub fn failed(account: &str, reason: FailureReason, attempts: u32) -> Self {
        Self {
            account: account.to_owned(),
            posts: Vec::new(),
            outcome: FetchOutcome::Failed(reason),
            attempts,
        }
    }
}

enum AttemptError {
    Source(FetchError),
    TimedOut(Duration),
}

impl AttemptError {
    fn outcome(&self) -> AttemptOutcome {
        match self {
            AttemptError::Source(err) if err.is_retriable() => AttemptOutcome::Retriable,
            AttemptError::Source(_) => AttemptOutcome::Fatal,
            AttemptError::TimedOut(_) => AttemptOutcome::Retriable,
        }
    }

    fn into_reason(self) -> FailureReason {
        match self {
            AttemptError::Source(err) => err.into(),
            AttemptError::TimedOut(_) => FailureReason::Timeout,
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Source(err) => write!(f, "{err}"),
            AttemptError::TimedOut(limit) => write!(f, "attempt timed out after {limit:?}"),
        }
    }
}

async fn attempt(
    source: &dyn PostSource,
    account: &str,
    max_count: usize,
    timeout: Option<Duration>,
) -> Result<Vec<ScrapedPost>, AttemptError> {
    let call = source.fetch(account, max_count);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AttemptError::TimedOut(limit))?
            .map_err(AttemptError::Source),
        None => call.await.map_err(AttemptError::Source),
    }
}

/// Fetches up to `max_count` posts for `account`, retrying transient
/// failures per `policy`.
///
/// Never returns an error: every failure is folded into the result's
/// [`FetchOutcome`]. Cancelling `cancel` abandons the in-flight attempt or
/// back-off sleep and yields `Failed(Cancelled)`.
pub async fn fetch_account(
    source: &dyn PostSource,
    account: &str,
    max_count: usize,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> AccountFetchResult {
    let mut state = RetryState::Attempting(1);
    let mut attempts = 0u32;
    let mut posts = Vec::new();
    let mut failure = FailureReason::Unknown;

    loop {
        state = match state {
            RetryState::Attempting(n) => {
                attempts = n;
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    result = attempt(source, account, max_count, policy.attempt_timeout) => Some(result),
                };
                match result {
                    None => {
                        failure = FailureReason::Cancelled;
                        RetryState::Aborted
                    }
                    Some(Ok(fetched)) => {
                        posts = fetched;
                        RetryState::Succeeded
                    }
                    Some(Err(err)) => {
                        let next = policy.next_state(n, err.outcome());
                        if matches!(next, RetryState::Retrying(_)) {
                            tracing::warn!(
                                account,
                                attempt = n,
                                max_attempts = policy.max_attempts(),
                                error = %err,
                                "fetch attempt failed"
                            );
                        } else {
                            tracing::error!(account, attempt = n, error = %err, "fetch failed");
                        }
                        failure = err.into_reason();
                        next
                    }
                }
            }
            RetryState::Retrying(n) => {
                let delay = policy.backoff_delay(n - 1);
                tracing::debug!(
                    account,
                    attempt = n,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "backing off before retry"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        failure = FailureReason::Cancelled;
                        RetryState::Aborted
                    }
                    () = tokio::time::sleep(delay) => RetryState::Attempting(n),
                }
            }
            RetryState::Succeeded => {
                return finish_success(account, posts, max_count, attempts);
            }
            RetryState::Exhausted | RetryState::Aborted => {
                return AccountFetchResult::failed(account, failure, attempts);
            }
        };
    }
}

fn finish_success(
    account: &str,
    mut posts: Vec<ScrapedPost>,
    max_count: usize,
    attempts: u32,
) -> AccountFetchResult {
    posts.truncate(max_count);
    for post in &mut posts {
        if post.account.trim().is_empty() {
            post.account = account.to_owned();
        }
    }
    let outcome = if posts.is_empty() {
        FetchOutcome::Empty
    } else {
        FetchOutcome::Ok
    };
    tracing::info!(account, posts = posts.len(), attempts, "fetch complete");
    AccountFetchResult {
        account: account.to_owned(),
        posts,
        outcome,
        attempts,
    }
}

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;
