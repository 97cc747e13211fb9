//! Post sources: the collaborators that list an account's recent posts.

mod apify;
mod fixture;

use async_trait::async_trait;
use reelmatch_core::ScrapedPost;

use crate::error::FetchError;

pub use apify::ApifyPostSource;
pub use fixture::FixturePostSource;

/// Lists an account's most recent posts, newest first.
///
/// Implementations may be slow; callers bound each call with their own
/// timeout and decide whether to retry based on [`FetchError::is_retriable`].
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Returns up to `max_count` posts for `account`.
    async fn fetch(&self, account: &str, max_count: usize) -> Result<Vec<ScrapedPost>, FetchError>;

    fn name(&self) -> &str;

    /// Maximum number of `fetch` calls this source tolerates at once.
    ///
    /// Sources that are not safe to call concurrently keep the default of 1.
    fn max_concurrent_fetches(&self) -> usize {
        1
    }
}
