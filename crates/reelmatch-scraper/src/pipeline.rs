//! End-to-end match pipeline: validate → schedule → aggregate.

use std::sync::Arc;
use std::time::Duration;

use reelmatch_core::AppConfig;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::ValidationError;
use crate::report::{aggregate, Report};
use crate::request::BulkMatchRequest;
use crate::retry::RetryPolicy;
use crate::scheduler::{run_all, AccountJob};
use crate::source::PostSource;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Upper bound on accounts fetched at once.
    pub worker_budget: usize,
    pub retry: RetryPolicy,
    /// `max_posts` for accounts that do not specify one.
    pub default_max_posts: usize,
    /// Wall-clock budget for a whole run; `None` disables it.
    pub deadline: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            worker_budget: 5,
            retry: RetryPolicy::default(),
            default_max_posts: 10,
            deadline: Some(Duration::from_secs(300)),
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            worker_budget: config.max_workers,
            retry: RetryPolicy::from_config(config),
            default_max_posts: config.default_max_posts,
            deadline: (config.pipeline_deadline_secs > 0)
                .then(|| Duration::from_secs(config.pipeline_deadline_secs)),
        }
    }
}

/// Matches target links for many accounts against one post source.
#[derive(Clone)]
pub struct MatchPipeline {
    source: Arc<dyn PostSource>,
    options: PipelineOptions,
}

impl MatchPipeline {
    pub fn new(source: Arc<dyn PostSource>, options: PipelineOptions) -> Self {
        Self { source, options }
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Validates `request` and runs it to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] before any fetch is scheduled
    /// when the request is malformed. Fetch failures never error; they are
    /// reported per account.
    pub async fn run(
        &self,
        request: &BulkMatchRequest,
        cancel: &CancellationToken,
    ) -> Result<Report, PipelineError> {
        let jobs = request.validate(self.options.default_max_posts)?;
        Ok(self.run_jobs(&jobs, cancel).await)
    }

    /// Fetches and matches already-validated jobs.
    ///
    /// When the configured deadline elapses, or `cancel` fires, in-flight
    /// accounts are abandoned and reported as `Failed(Cancelled)` alongside
    /// whatever already completed.
    pub async fn run_jobs(&self, jobs: &[AccountJob], cancel: &CancellationToken) -> Report {
        let run_cancel = cancel.child_token();
        let deadline_timer = self.options.deadline.map(|deadline| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(
                    deadline_secs = deadline.as_secs(),
                    "pipeline deadline reached, cancelling remaining fetches"
                );
                token.cancel();
            })
        });

        let results = run_all(
            self.source.as_ref(),
            jobs,
            self.options.worker_budget,
            &self.options.retry,
            &run_cancel,
        )
        .await;

        if let Some(timer) = deadline_timer {
            timer.abort();
        }

        aggregate(results, jobs)
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
