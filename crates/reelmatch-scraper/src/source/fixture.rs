use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use reelmatch_core::ScrapedPost;
use serde::Deserialize;

use super::PostSource;
use crate::error::{FetchError, ScraperError};

/// Accepted fixture file layouts.
#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    /// `{"nasa": [{...}, ...], "other": [...]}`
    ByAccount(HashMap<String, Vec<ScrapedPost>>),
    /// `[{"username": "nasa", ...}, ...]`
    Flat(Vec<ScrapedPost>),
}

/// Post source backed by an in-memory map of account → posts.
///
/// Accounts absent from the map are reported as not found. Used for offline
/// CLI runs and tests.
#[derive(Debug, Clone, Default)]
pub struct FixturePostSource {
    posts: HashMap<String, Vec<ScrapedPost>>,
}

impl FixturePostSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `posts` (newest first) for `account`, replacing any
    /// previously registered posts.
    #[must_use]
    pub fn with_posts(mut self, account: &str, posts: Vec<ScrapedPost>) -> Self {
        self.posts.insert(account.to_owned(), posts);
        self
    }

    /// Groups posts by their `account` field, keeping input order.
    pub fn from_posts(posts: impl IntoIterator<Item = ScrapedPost>) -> Self {
        let mut by_account: HashMap<String, Vec<ScrapedPost>> = HashMap::new();
        for post in posts {
            by_account.entry(post.account.clone()).or_default().push(post);
        }
        Self { posts: by_account }
    }

    /// Parses a fixture from JSON, either keyed by account or as a flat
    /// list of posts carrying `username`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Deserialize`] if `json` matches neither layout.
    pub fn from_json_str(json: &str) -> Result<Self, ScraperError> {
        let file: FixtureFile =
            serde_json::from_str(json).map_err(|source| ScraperError::Deserialize {
                context: "post fixture".to_owned(),
                source,
            })?;
        Ok(match file {
            FixtureFile::ByAccount(posts) => Self { posts },
            FixtureFile::Flat(posts) => Self::from_posts(posts),
        })
    }

    /// Reads and parses a fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Io`] if the file cannot be read, or
    /// [`ScraperError::Deserialize`] if it is not a valid fixture.
    pub fn from_json_path(path: &Path) -> Result<Self, ScraperError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScraperError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    #[must_use]
    pub fn account_count(&self) -> usize {
        self.posts.len()
    }
}

#[async_trait]
impl PostSource for FixturePostSource {
    async fn fetch(&self, account: &str, max_count: usize) -> Result<Vec<ScrapedPost>, FetchError> {
        let posts = self.posts.get(account).ok_or_else(|| FetchError::NotFound {
            account: account.to_owned(),
        })?;
        Ok(posts.iter().take(max_count).cloned().collect())
    }

    fn name(&self) -> &str {
        "fixture"
    }

    fn max_concurrent_fetches(&self) -> usize {
        usize::MAX
    }
}
