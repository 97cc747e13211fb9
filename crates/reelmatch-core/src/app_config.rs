use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub apify_token: Option<String>,
    pub apify_base_url: String,
    /// Per-HTTP-request timeout used by network post sources.
    pub scraper_timeout_secs: u64,
    pub scraper_user_agent: String,
    /// Upper bound on a single fetch attempt for one account.
    pub fetch_timeout_secs: u64,
    /// Upper bound on accounts fetched concurrently by one pipeline run.
    pub max_workers: usize,
    /// Additional attempts per account after the first transient failure.
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Posts requested per account when the caller omits `max_posts`.
    pub default_max_posts: usize,
    /// Wall-clock budget for one pipeline run; `0` disables the deadline.
    pub pipeline_deadline_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "apify_token",
                &self.apify_token.as_ref().map(|_| "[redacted]"),
            )
            .field("apify_base_url", &self.apify_base_url)
            .field("scraper_timeout_secs", &self.scraper_timeout_secs)
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_workers", &self.max_workers)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("default_max_posts", &self.default_max_posts)
            .field("pipeline_deadline_secs", &self.pipeline_deadline_secs)
            .finish()
    }
}
