//! Scripted post source shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reelmatch_core::{PostMetadata, ScrapedPost};

use crate::error::FetchError;
use crate::source::PostSource;

/// One scripted response to a `fetch` call.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Posts(Vec<ScrapedPost>),
    Fail(FetchError),
    /// Never completes.
    Hang,
    Panic,
}

/// Replays per-account scripts and records how it was called.
///
/// Once an account's script runs out, its last step repeats. Accounts with
/// no script are not found.
pub(crate) struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, u32>>,
    capacity: usize,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            capacity,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn script(self, account: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(account.to_owned(), steps.into());
        self
    }

    pub(crate) fn calls(&self, account: &str) -> u32 {
        self.calls.lock().unwrap().get(account).copied().unwrap_or(0)
    }

    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_step(&self, account: &str) -> Option<Step> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(account.to_owned())
            .or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.get_mut(account)?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostSource for ScriptedSource {
    async fn fetch(&self, account: &str, max_count: usize) -> Result<Vec<ScrapedPost>, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        let step = self.next_step(account);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match step {
            None => Err(FetchError::NotFound {
                account: account.to_owned(),
            }),
            Some(Step::Posts(posts)) => Ok(posts.into_iter().take(max_count).collect()),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Panic) => panic!("scripted panic for {account}"),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn max_concurrent_fetches(&self) -> usize {
        self.capacity
    }
}

pub(crate) fn post(account: &str, shortcode: &str, likes: u64) -> ScrapedPost {
    ScrapedPost {
        account: account.to_owned(),
        shortcode: shortcode.to_owned(),
        url: format!("https://www.instagram.com/reel/{shortcode}/"),
        metadata: PostMetadata {
            likes,
            ..PostMetadata::default()
        },
    }
}

pub(crate) fn transient(account: &str) -> FetchError {
    FetchError::Transient {
        account: account.to_owned(),
        reason: "connection reset".to_owned(),
    }
}
