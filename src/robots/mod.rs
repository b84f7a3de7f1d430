//! Robots.txt handling module
//!
//! This module fetches, evaluates and caches robots.txt per host.
//!
//! # Retrieval outcomes
//!
//! | robots.txt response | Decision |
//! |---------------------|----------|
//! | 2xx | Rules from the body |
//! | 404 / 410 | Allow everything |
//! | Any other status, timeout or transport error | Deny the whole host |

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;

use crate::crawler::{FetchError, Fetcher};
use crate::url::{normalize_url, CanonicalUrl};
use std::time::Duration;

/// Returns the robots.txt URL for the host serving `url`
pub fn robots_url(url: &CanonicalUrl) -> Option<CanonicalUrl> {
    let origin = url.as_url().origin().ascii_serialization();
    normalize_url(&format!("{}/robots.txt", origin), None).ok()
}

/// Returns the cache key for `url`'s host, including a non-default port
pub fn host_key(url: &CanonicalUrl) -> String {
    url.authority().into_owned()
}

/// Returns the product token of a User-Agent header (`tidewalk/0.1` → `tidewalk`)
///
/// robots.txt groups are matched against this token.
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}

/// Fetches robots.txt for the host serving `url`
///
/// # Arguments
///
/// * `fetcher` - Used for the robots.txt request
/// * `url` - Any URL on the host
/// * `timeout` - Deadline for the request
///
/// # Returns
///
/// The host's rules. Failures never propagate: they become `DenyAll`
/// (or `AllowAll` for 404/410).
pub async fn fetch_robots(
    fetcher: &dyn Fetcher,
    url: &CanonicalUrl,
    timeout: Duration,
) -> RobotsRules {
    let Some(robots) = robots_url(url) else {
        tracing::warn!(url = %url, "Cannot derive robots.txt URL, denying host");
        return RobotsRules::DenyAll;
    };

    let result = match tokio::time::timeout(timeout, fetcher.fetch_plain(&robots, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };

    match result {
        Ok(page) => {
            tracing::debug!(url = %robots, "Fetched robots.txt");
            RobotsRules::from_content(&page.text())
        }
        Err(FetchError::HttpStatus(404 | 410)) => {
            tracing::debug!(url = %robots, "No robots.txt, allowing all");
            RobotsRules::AllowAll
        }
        Err(e) => {
            tracing::warn!(url = %robots, error = %e, "robots.txt unavailable, denying host");
            RobotsRules::DenyAll
        }
    }
}
