//! Bounded retry for pages that need dynamic rendering
//!
//! Only [`FetchError::RenderIncomplete`] from a render-capable fetcher is
//! retried. Timeouts, transport errors and HTTP errors are final on the
//! first attempt.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::url::CanonicalUrl;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Slack added to the fetch timeout before the engine gives up on a fetcher
/// that ignores its own deadline
const TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// How many times a render-incomplete fetch is attempted, and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first; at least 1
    pub max_attempts: u32,

    /// Wait before the second attempt; doubled for each one after
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_render_attempts,
            Duration::from_millis(config.render_backoff_ms),
        )
    }

    /// Returns the wait after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Attempt counter for one URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true if `error` is retryable and the policy allows another attempt
    pub fn should_retry(&self, error: &FetchError, policy: &RetryPolicy) -> bool {
        *error == FetchError::RenderIncomplete && self.attempts < policy.max_attempts
    }
}

/// Result of fetching one URL, with the number of attempts it took
#[derive(Debug)]
pub struct FetchAttempt {
    pub result: Result<FetchedPage, FetchError>,
    pub attempts: u32,
}

/// Fetches `url`, retrying render-incomplete pages with exponential backoff
///
/// Every attempt is bounded by `timeout`. Cancellation cuts a backoff wait
/// short and returns the last error; an attempt already in flight runs to
/// completion or timeout.
///
/// # Arguments
///
/// * `fetcher` - The fetch capability
/// * `url` - The URL to fetch
/// * `timeout` - Per-attempt deadline
/// * `policy` - Attempt bound and backoff
/// * `cancel` - Run-level cancellation signal
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &CanonicalUrl,
    timeout: Duration,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> FetchAttempt {
    let mut state = RetryState::new();

    loop {
        state.record_attempt();
        let deadline = timeout + TIMEOUT_GRACE;
        let result = match tokio::time::timeout(deadline, fetcher.fetch(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        let error = match result {
            Ok(page) => {
                return FetchAttempt {
                    result: Ok(page),
                    attempts: state.attempts(),
                }
            }
            Err(error) => error,
        };

        if !fetcher.supports_rendering() || !state.should_retry(&error, policy) {
            return FetchAttempt {
                result: Err(error),
                attempts: state.attempts(),
            };
        }

        let backoff = policy.backoff_for(state.attempts());
        tracing::debug!(
            url = %url,
            attempt = state.attempts(),
            backoff_ms = backoff.as_millis() as u64,
            "Page not ready, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => {
                return FetchAttempt {
                    result: Err(error),
                    attempts: state.attempts(),
                };
            }
        }
    }
}
