//! Bounded worker pool that runs one fetch task per account.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::fetch::{fetch_account, AccountFetchResult, FailureReason};
use crate::retry::RetryPolicy;
use crate::source::PostSource;

/// One validated account to fetch and match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountJob {
    pub account: String,
    /// Caller's links, trimmed, in submission order.
    pub target_links: Vec<String>,
    pub max_posts: usize,
}

/// Number of fetch tasks allowed to run at once against `source`.
#[must_use]
pub fn effective_concurrency(source: &dyn PostSource, worker_budget: usize) -> usize {
    worker_budget.min(source.max_concurrent_fetches()).max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "fetch task panicked".to_owned())
}

/// Fetches every job's account with bounded concurrency.
///
/// Jobs beyond the concurrency limit queue until a slot frees. A failing or
/// panicking task is recorded against its own account only. Once `cancel`
/// fires, in-flight tasks are abandoned and queued jobs are recorded as
/// `Failed(Cancelled)` without calling the source.
pub async fn run_all(
    source: &dyn PostSource,
    jobs: &[AccountJob],
    worker_budget: usize,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> HashMap<String, AccountFetchResult> {
    if jobs.is_empty() {
        return HashMap::new();
    }

    let concurrency = effective_concurrency(source, worker_budget);
    tracing::info!(
        accounts = jobs.len(),
        concurrency,
        source = source.name(),
        "scheduling account fetches"
    );

    let tasks: Vec<BoxFuture<'_, AccountFetchResult>> = jobs
        .iter()
        .map(|job| async move {
            if cancel.is_cancelled() {
                return AccountFetchResult::failed(&job.account, FailureReason::Cancelled, 0);
            }
            let task = fetch_account(source, &job.account, job.max_posts, policy, cancel);
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(account = %job.account, panic = %message, "fetch task panicked");
                    AccountFetchResult::failed(&job.account, FailureReason::Internal(message), 0)
                }
            }
        }
        .boxed())
        .collect();

    let results: Vec<AccountFetchResult> = stream::iter(tasks)
        .buffer_unordered(concurrency)
        .collect()
        .await;

    results
        .into_iter()
        .map(|result| (result.account.clone(), result))
        .collect()
}
