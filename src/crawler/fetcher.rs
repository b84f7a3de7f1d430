//! Fetcher capability and its HTTP implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests with a per-fetch timeout
//! - Readiness checking for pages that render their content late
//! - Error classification into [`FetchError`]

use crate::config::Config;
use crate::crawler::parser::{contains_selector, find_consent_button};
use crate::url::CanonicalUrl;
use crate::TidewalkError;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use scraper::Selector;
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// Per-URL fetch failure
///
/// None of these abort a run; the engine records them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Fetch timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Content was not ready yet; retrying may succeed
    #[error("Page requires dynamic rendering and was not ready")]
    RenderIncomplete,
}

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The canonical URL that was requested
    pub url: CanonicalUrl,

    /// URL after redirects; the base for resolving relative references
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, if present
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Creates a 200 HTML page whose final URL is the requested one
    pub fn html(url: &CanonicalUrl, body: impl Into<String>) -> Self {
        Self {
            url: url.clone(),
            final_url: url.as_url().clone(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into().into_bytes(),
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Returns true if the content is HTML or carries no Content-Type at all
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(content_type) => content_type.to_ascii_lowercase().contains("html"),
            None => true,
        }
    }
}

/// The capability of retrieving a resource by URL
///
/// Implementations must honor `timeout` and report failures through
/// [`FetchError`] rather than panicking.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, giving up after `timeout`
    async fn fetch(&self, url: &CanonicalUrl, timeout: Duration) -> Result<FetchedPage, FetchError>;

    /// Fetches `url` as a plain document, skipping any render-readiness check
    ///
    /// Used for policy files such as robots.txt, which never render.
    async fn fetch_plain(
        &self,
        url: &CanonicalUrl,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch(url, timeout).await
    }

    /// Returns true if this fetcher can report [`FetchError::RenderIncomplete`]
    ///
    /// Only such fetchers get the bounded render retry.
    fn supports_rendering(&self) -> bool {
        false
    }

    /// Returns false if concurrent `fetch` calls must be serialized
    fn is_reentrant(&self) -> bool {
        true
    }

    /// Hook run on a fetched page before link extraction
    ///
    /// Interactive fetchers use this to accept consent banners.
    async fn prepare_extraction(&self, _page: &FetchedPage) {}

    /// Releases any session held by the fetcher
    ///
    /// Called exactly once at the end of every run, however it ends.
    async fn close(&self) {}
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use tidewalk::crawler::build_http_client;
///
/// let client = build_http_client("tidewalk/0.1").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP fetcher backed by reqwest
///
/// Safe to call concurrently. When a readiness selector is configured it also
/// acts as a render-capable fetcher: an HTML body without a matching element
/// is reported as [`FetchError::RenderIncomplete`].
pub struct HttpFetcher {
    client: Client,
    ready_selector: Option<Selector>,
    simulate_consent: bool,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawl configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Ready to fetch
    /// * `Err(TidewalkError)` - The client could not be built or the selector is invalid
    pub fn new(config: &Config) -> Result<Self, TidewalkError> {
        let client = build_http_client(&config.robots.user_agent)?;

        let ready_selector = match &config.fetcher.ready_selector {
            Some(raw) => Some(parse_selector(raw)?),
            None => None,
        };

        Ok(Self {
            client,
            ready_selector,
            simulate_consent: config.fetcher.simulate_consent,
        })
    }

    /// Creates a fetcher around an existing client with no readiness check
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            ready_selector: None,
            simulate_consent: false,
        }
    }

    /// Sets the readiness selector
    pub fn with_ready_selector(mut self, selector: &str) -> Result<Self, TidewalkError> {
        self.ready_selector = Some(parse_selector(selector)?);
        Ok(self)
    }
}

fn parse_selector(raw: &str) -> Result<Selector, TidewalkError> {
    Selector::parse(raw).map_err(|e| {
        crate::ConfigError::Validation(format!("Invalid ready-selector '{}': {}", raw, e)).into()
    })
}

impl HttpFetcher {
    async fn request(&self, url: &CanonicalUrl, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(classify_error)?.to_vec();

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &CanonicalUrl, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let page = self.request(url, timeout).await?;

        if let Some(selector) = &self.ready_selector {
            if page.is_html() && !contains_selector(&page.text(), selector) {
                tracing::debug!(url = %url, "Ready selector not found");
                return Err(FetchError::RenderIncomplete);
            }
        }

        Ok(page)
    }

    async fn fetch_plain(
        &self,
        url: &CanonicalUrl,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        self.request(url, timeout).await
    }

    fn supports_rendering(&self) -> bool {
        self.ready_selector.is_some()
    }

    async fn prepare_extraction(&self, page: &FetchedPage) {
        if !self.simulate_consent || !page.is_html() {
            return;
        }

        if let Some(label) = find_consent_button(&page.text()) {
            tracing::info!(url = %page.url, button = %label, "Consent accepted (simulated)");
        }
    }
}

/// Maps a reqwest error onto the fetch failure taxonomy
fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::HttpStatus(status.as_u16())
    } else {
        FetchError::Transport(error.to_string())
    }
}
