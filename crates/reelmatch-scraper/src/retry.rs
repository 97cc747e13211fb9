//! Retry policy and the per-account attempt state machine.
//!
//! A fetch task moves through [`RetryState`] one transition per attempt:
//!
//! ```text
//! Attempting(n) ──success──────────────▶ Succeeded
//!               ──retriable, n ≤ max───▶ Retrying(n + 1) ──sleep──▶ Attempting(n + 1)
//!               ──retriable, n > max───▶ Exhausted
//!               ──fatal / cancelled────▶ Aborted
//! ```
//!
//! Attempts are numbered from 1, so `max_retries = 3` allows four attempts.

use std::time::Duration;

use reelmatch_core::AppConfig;

const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How a fetch task retries transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first transient failure.
    pub max_retries: u32,
    pub backoff_base: Duration,
    /// Upper bound on the un-jittered delay between attempts.
    pub max_backoff: Duration,
    /// Bound on one source call; `None` leaves attempts unbounded.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_base: Duration::from_millis(500),
            max_backoff: DEFAULT_MAX_BACKOFF,
            attempt_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Position of a fetch task in its retry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Running attempt `n` (1-based).
    Attempting(u32),
    /// Waiting out the back-off before attempt `n`.
    Retrying(u32),
    Succeeded,
    /// Every allowed attempt failed transiently.
    Exhausted,
    /// Stopped early by a terminal error or cancellation.
    Aborted,
}

/// Classification of one finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Retriable,
    Fatal,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.retry_backoff_base_ms),
            max_backoff: DEFAULT_MAX_BACKOFF,
            attempt_timeout: (config.fetch_timeout_secs > 0)
                .then(|| Duration::from_secs(config.fetch_timeout_secs)),
        }
    }

    /// Total attempts this policy permits.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// State that follows attempt `attempt` finishing with `outcome`.
    #[must_use]
    pub fn next_state(&self, attempt: u32, outcome: AttemptOutcome) -> RetryState {
        match outcome {
            AttemptOutcome::Success => RetryState::Succeeded,
            AttemptOutcome::Fatal => RetryState::Aborted,
            AttemptOutcome::Retriable if attempt >= self.max_attempts() => RetryState::Exhausted,
            AttemptOutcome::Retriable => RetryState::Retrying(attempt + 1),
        }
    }

    /// Delay before retry number `retry` (1 for the first retry).
    ///
    /// Back-off schedule with `backoff_base = 500 ms`:
    ///
    /// | Retry | Sleep                         |
    /// |-------|-------------------------------|
    /// | 1     | 500 ms × 2⁰ ± 25 % jitter     |
    /// | 2     | 500 ms × 2¹ ± 25 % jitter     |
    /// | 3     | 500 ms × 2² ± 25 % jitter     |
    ///
    /// The un-jittered delay is capped at `max_backoff`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let base_ms = u64::try_from(self.backoff_base.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        let exponent = retry.saturating_sub(1).min(20);
        let capped = base_ms.saturating_mul(1u64 << exponent).min(cap_ms);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(delay_ms)
    }
}
