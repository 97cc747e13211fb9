pub mod error;
pub mod fetch;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod retry;
pub mod scheduler;
pub mod shortcode;
pub mod source;

#[cfg(test)]
mod test_support;

pub use error::{FetchError, ScraperError, ValidationError};
pub use fetch::{fetch_account, AccountFetchResult, FailureReason, FetchOutcome};
pub use matcher::{match_posts, MatchOutcome};
pub use pipeline::{MatchPipeline, PipelineError, PipelineOptions};
pub use report::{aggregate, AccountReport, Report, ReportSummary};
pub use request::{AccountRequest, BulkMatchRequest, SingleMatchRequest};
pub use retry::{AttemptOutcome, RetryPolicy, RetryState};
pub use scheduler::{run_all, AccountJob};
pub use shortcode::{extract_shortcode, Shortcode};
pub use source::{ApifyPostSource, FixturePostSource, PostSource};
