use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a [`crate::PostSource`] for a single fetch attempt.
///
/// Only [`FetchError::Transient`] is worth retrying; every other variant is
/// terminal for the account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("account not found: {account}")]
    NotFound { account: String },

    #[error("transient error fetching {account}: {reason}")]
    Transient { account: String, reason: String },

    #[error("blocked while fetching {account}: {reason}")]
    Blocked { account: String, reason: String },

    #[error("unusable response fetching {account}: {reason}")]
    InvalidResponse { account: String, reason: String },
}

impl FetchError {
    /// Returns `true` for errors that may succeed on a later attempt.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Errors raised inside the concrete post-source adapters.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by upstream (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("scraper run {run_id} finished with status {status}")]
    RunFailed { run_id: String, status: String },

    #[error("scraper run {run_id} still unfinished after {polls} status polls")]
    RunStalled { run_id: String, polls: u32 },

    #[error("profile {account} does not exist")]
    ProfileNotFound { account: String },

    #[error("profile {account} is unavailable: {reason}")]
    ProfileUnavailable { account: String, reason: String },

    #[error("APIFY_TOKEN is not configured")]
    MissingToken,

    #[error("failed to read fixture {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScraperError {
    /// Classifies an adapter error into the post-source failure taxonomy.
    ///
    /// - Network failures, 429, 5xx and failed or stalled scraper runs are transient.
    /// - Rejected credentials and private/restricted profiles are blocked.
    /// - A missing profile is `NotFound`.
    /// - Anything else (undecodable bodies, other 4xx) cannot improve on retry.
    #[must_use]
    pub fn into_fetch_error(self, account: &str) -> FetchError {
        let account = account.to_owned();
        match self {
            ScraperError::ProfileNotFound { .. } => FetchError::NotFound { account },
            ScraperError::Http(_)
            | ScraperError::RateLimited { .. }
            | ScraperError::RunFailed { .. }
            | ScraperError::RunStalled { .. } => FetchError::Transient {
                account,
                reason: self.to_string(),
            },
            ScraperError::UnexpectedStatus { status, .. } if status >= 500 => {
                FetchError::Transient {
                    account,
                    reason: self.to_string(),
                }
            }
            ScraperError::Unauthorized { .. } | ScraperError::ProfileUnavailable { .. } => {
                FetchError::Blocked {
                    account,
                    reason: self.to_string(),
                }
            }
            ScraperError::UnexpectedStatus { .. }
            | ScraperError::Deserialize { .. }
            | ScraperError::MissingToken
            | ScraperError::Io { .. } => FetchError::InvalidResponse {
                account,
                reason: self.to_string(),
            },
        }
    }
}

/// Caller input that fails request validation. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("accounts cannot be empty")]
    NoAccounts,

    #[error("accounts[{index}]: account name is required")]
    MissingAccount { index: usize },

    #[error("target links for '{account}' cannot be empty")]
    NoTargetLinks { account: String },

    #[error("target_links[{index}] for '{account}' cannot be empty")]
    BlankTargetLink { account: String, index: usize },

    #[error("max_posts for '{account}' must be positive, got {value}")]
    InvalidMaxPosts { account: String, value: i64 },
}
