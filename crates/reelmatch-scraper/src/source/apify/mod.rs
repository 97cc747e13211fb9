mod types;

use std::time::Duration;

use async_trait::async_trait;
use reelmatch_core::{AppConfig, ScrapedPost};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::PostSource;
use crate::error::{FetchError, ScraperError};
use types::{ApiResponse, DatasetItem, InstagramScraperInput, RunData};

/// Actor ID for apify/instagram-post-scraper.
const INSTAGRAM_POST_SCRAPER: &str = "nH2AHrwxeTRJoN5hX";

/// Concurrent actor runs one Apify account is allowed.
const MAX_CONCURRENT_RUNS: usize = 10;

/// Status polls before an unfinished run is given up on.
const MAX_STATUS_POLLS: u32 = 30;

/// Post source backed by a hosted Instagram post-scraper actor.
///
/// Each fetch starts an actor run, long-polls it to completion, then reads
/// the run's dataset. A single attempt may take minutes; the caller bounds
/// it with its own timeout.
pub struct ApifyPostSource {
    client: Client,
    token: String,
    base_url: String,
    actor_id: String,
    /// `waitForFinish` value for run polling; kept below the request timeout.
    wait_secs: u64,
}

impl ApifyPostSource {
    /// Creates a source that talks to the Apify API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        token: impl Into<String>,
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            actor_id: INSTAGRAM_POST_SCRAPER.to_owned(),
            wait_secs: timeout_secs.saturating_sub(5).clamp(1, 60),
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::MissingToken`] when `APIFY_TOKEN` is unset, or
    /// [`ScraperError::Http`] if the client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let token = config
            .apify_token
            .clone()
            .ok_or(ScraperError::MissingToken)?;
        Self::new(
            token,
            &config.apify_base_url,
            config.scraper_timeout_secs,
            &config.scraper_user_agent,
        )
    }

    /// Uses a different actor with the same input/output schema.
    #[must_use]
    pub fn with_actor(mut self, actor_id: &str) -> Self {
        self.actor_id = actor_id.to_owned();
        self
    }

    async fn start_run(&self, account: &str, limit: usize) -> Result<RunData, ScraperError> {
        let input = InstagramScraperInput {
            username: vec![account.to_owned()],
            results_limit: limit,
        };
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;
        let run: ApiResponse<RunData> = read_json(response, &url, "actor run start").await?;
        Ok(run.data)
    }

    async fn wait_for_run(&self, run_id: &str) -> Result<RunData, ScraperError> {
        let url = format!(
            "{}/actor-runs/{run_id}?waitForFinish={}",
            self.base_url, self.wait_secs
        );
        for poll in 1..=MAX_STATUS_POLLS {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let run: ApiResponse<RunData> = read_json(response, &url, "actor run status").await?;
            match run.data.status.as_str() {
                "SUCCEEDED" => return Ok(run.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ScraperError::RunFailed {
                        run_id: run.data.id,
                        status: run.data.status,
                    });
                }
                _ => {
                    tracing::debug!(run_id, poll, status = %run.data.status, "run still in progress");
                }
            }
        }
        Err(ScraperError::RunStalled {
            run_id: run_id.to_owned(),
            polls: MAX_STATUS_POLLS,
        })
    }

    fn abort_guard(&self, run_id: &str) -> RunAbortGuard {
        RunAbortGuard {
            client: self.client.clone(),
            url: format!("{}/actor-runs/{run_id}/abort", self.base_url),
            token: self.token.clone(),
            armed: true,
        }
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<DatasetItem>, ScraperError> {
        let url = format!("{}/datasets/{dataset_id}/items?format=json", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        read_json(response, &url, "dataset items").await
    }

    async fn scrape(&self, account: &str, max_count: usize) -> Result<Vec<ScrapedPost>, ScraperError> {
        let run = self.start_run(account, max_count).await?;
        tracing::debug!(account, run_id = %run.id, "apify run started");

        // Aborts the run unless polling sees it reach a terminal status.
        let guard = self.abort_guard(&run.id);
        let completed = match self.wait_for_run(&run.id).await {
            Ok(completed) => completed,
            Err(err @ ScraperError::RunFailed { .. }) => {
                guard.disarm();
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        guard.disarm();
        let items = self.dataset_items(&completed.default_dataset_id).await?;

        let mut posts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                DatasetItem::Post(post) => posts.push(post.into_scraped(account)),
                DatasetItem::Error(err) if err.is_not_found() => {
                    return Err(ScraperError::ProfileNotFound {
                        account: account.to_owned(),
                    });
                }
                DatasetItem::Error(err) => {
                    return Err(ScraperError::ProfileUnavailable {
                        account: account.to_owned(),
                        reason: err.describe(),
                    });
                }
            }
        }
        tracing::debug!(account, count = posts.len(), "apify dataset read");
        Ok(posts)
    }
}

/// Aborts an unfinished actor run when dropped while armed.
///
/// The abort request is spawned onto the current runtime and is best-effort.
struct RunAbortGuard {
    client: Client,
    url: String,
    token: String,
    armed: bool,
}

impl RunAbortGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunAbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = self.client.clone();
        let url = std::mem::take(&mut self.url);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            match client.post(&url).bearer_auth(&token).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(url = %url, "apify run aborted");
                }
                Ok(response) => {
                    tracing::warn!(url = %url, status = response.status().as_u16(), "apify run abort rejected");
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "apify run abort failed"),
            }
        });
    }
}

/// Maps non-2xx statuses to typed errors, then decodes the body as `T`.
async fn read_json<T: DeserializeOwned>(
    response: Response,
    url: &str,
    context: &str,
) -> Result<T, ScraperError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ScraperError::Unauthorized {
            status: status.as_u16(),
        });
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        return Err(ScraperError::RateLimited { retry_after_secs });
    }

    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: redact_query(url),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| ScraperError::Deserialize {
        context: context.to_owned(),
        source,
    })
}

fn redact_query(url: &str) -> String {
    url.split_once('?')
        .map_or(url, |(path, _)| path)
        .to_owned()
}

#[async_trait]
impl PostSource for ApifyPostSource {
    async fn fetch(&self, account: &str, max_count: usize) -> Result<Vec<ScrapedPost>, FetchError> {
        self.scrape(account, max_count)
            .await
            .map_err(|e| e.into_fetch_error(account))
    }

    fn name(&self) -> &str {
        "apify"
    }

    fn max_concurrent_fetches(&self) -> usize {
        MAX_CONCURRENT_RUNS
    }
}
