//! Folds per-account fetch results into the caller-facing report.

use std::collections::HashMap;

use reelmatch_core::MatchedPost;
use serde::Serialize;

use crate::fetch::{AccountFetchResult, FailureReason, FetchOutcome};
use crate::matcher::match_posts;
use crate::scheduler::AccountJob;

/// Per-account section of a [`Report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountReport {
    pub username: String,
    pub total_reels_scraped: usize,
    pub total_target_links: usize,
    pub matched_posts_count: usize,
    pub matched_posts: Vec<MatchedPost>,
    pub unmatchable_targets: Vec<String>,
    pub duplicate_targets: Vec<String>,
    pub not_found_targets: Vec<String>,
    pub fetch_outcome: FetchOutcome,
    pub attempts: u32,
}

/// Totals across every account in a [`Report`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub accounts_processed: usize,
    /// Accounts whose fetch failed for any reason other than not found.
    pub accounts_failed: usize,
    pub accounts_not_found: usize,
    pub accounts_empty: usize,
    pub total_reels_scraped: usize,
    pub total_matched: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// In the caller's request order.
    pub accounts: Vec<AccountReport>,
    pub summary: ReportSummary,
}

impl Report {
    /// Report section for `account`, if it was requested.
    #[must_use]
    pub fn account(&self, account: &str) -> Option<&AccountReport> {
        self.accounts.iter().find(|a| a.username == account)
    }
}

/// Builds the report for `jobs` from the scheduler's results.
///
/// Each account is matched only against posts it owns; posts the source
/// returned for another owner (collabs, tags) are dropped before matching
/// and not counted. Owner names compare case-insensitively. A job with no
/// recorded result is reported as `Failed(Unknown)`.
#[must_use]
pub fn aggregate(mut results: HashMap<String, AccountFetchResult>, jobs: &[AccountJob]) -> Report {
    let mut summary = ReportSummary::default();
    let mut accounts = Vec::with_capacity(jobs.len());

    for job in jobs {
        let result = results.remove(&job.account).unwrap_or_else(|| {
            tracing::warn!(account = %job.account, "no fetch result recorded");
            AccountFetchResult::failed(&job.account, FailureReason::Unknown, 0)
        });

        let (posts, foreign): (Vec<_>, Vec<_>) = result
            .posts
            .into_iter()
            .partition(|post| post.account.eq_ignore_ascii_case(&job.account));
        if !foreign.is_empty() {
            tracing::debug!(
                account = %job.account,
                skipped = foreign.len(),
                "ignoring posts owned by other accounts"
            );
        }

        let outcome = match_posts(&posts, &job.target_links);

        summary.accounts_processed += 1;
        match &result.outcome {
            FetchOutcome::Ok => {}
            FetchOutcome::Empty => summary.accounts_empty += 1,
            FetchOutcome::Failed(FailureReason::NotFound) => summary.accounts_not_found += 1,
            FetchOutcome::Failed(_) => summary.accounts_failed += 1,
        }
        summary.total_reels_scraped += posts.len();
        summary.total_matched += outcome.matched.len();

        accounts.push(AccountReport {
            username: job.account.clone(),
            total_reels_scraped: posts.len(),
            total_target_links: job.target_links.len(),
            matched_posts_count: outcome.matched.len(),
            matched_posts: outcome.matched,
            unmatchable_targets: outcome.unmatchable_targets,
            duplicate_targets: outcome.duplicate_targets,
            not_found_targets: outcome.not_found_targets,
            fetch_outcome: result.outcome,
            attempts: result.attempts,
        });
    }

    tracing::info!(
        accounts = summary.accounts_processed,
        failed = summary.accounts_failed,
        not_found = summary.accounts_not_found,
        matched = summary.total_matched,
        "report aggregated"
    );

    Report { accounts, summary }
}
