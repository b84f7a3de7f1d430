//! Admission control applied before every fetch
//!
//! The gate answers two questions: may this URL be fetched at all (robots.txt),
//! and when may the next fetch start (pacing). Robots decisions are cached per
//! host for the whole run.

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::robots::{fetch_robots, host_key, product_token, RobotsCache};
use crate::url::CanonicalUrl;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Robots.txt and rate-limit admission for one crawl run
pub struct PolicyGate {
    fetcher: Arc<dyn Fetcher>,
    robots: RobotsCache,
    bypass: bool,
    agent: String,
    robots_timeout: Duration,
    delay: Duration,
    last_dispatch: tokio::sync::Mutex<Option<Instant>>,
}

impl PolicyGate {
    /// Creates a gate that fetches robots.txt through `fetcher`
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies bypass, user agent, delay and timeout settings
    /// * `fetcher` - Shared with the engine; used for robots.txt requests
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>) -> Self {
        if config.robots.bypass {
            tracing::warn!("robots.txt bypass enabled: disallow rules will be ignored");
        }

        Self {
            fetcher,
            robots: RobotsCache::new(),
            bypass: config.robots.bypass,
            agent: product_token(&config.robots.user_agent).to_string(),
            robots_timeout: Duration::from_secs(config.crawler.fetch_timeout_secs),
            delay: Duration::from_millis(config.crawler.delay_ms),
            last_dispatch: tokio::sync::Mutex::new(None),
        }
    }

    /// Returns true if `url` may be fetched
    ///
    /// Consulted once per URL before its fetch is dispatched.
    pub async fn admit(&self, url: &CanonicalUrl) -> bool {
        let allowed = self.robots_allows(url).await;
        if !allowed {
            tracing::debug!(url = %url, "Denied by robots.txt");
        }
        allowed
    }

    /// Checks `url` against its host's robots.txt
    ///
    /// The first call for a host fetches and caches the file.
    pub async fn robots_allows(&self, url: &CanonicalUrl) -> bool {
        if self.bypass {
            return true;
        }

        let rules = self
            .robots
            .get_or_load(&host_key(url), || {
                fetch_robots(self.fetcher.as_ref(), url, self.robots_timeout)
            })
            .await;

        rules.is_allowed(url.as_str(), &self.agent)
    }

    /// Waits until the minimum delay since the previous dispatch has elapsed
    ///
    /// Callers are released one at a time, each at least one delay apart.
    pub async fn pace(&self) {
        let delay = self.delay;
        let mut last = self.last_dispatch.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Returns the interval enforced between dispatches
    ///
    /// Fixed for the run; robots.txt `Crawl-delay` is not consulted.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns true if robots.txt checks are skipped
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }
}
