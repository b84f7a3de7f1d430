//! Crawler module for traversal and page retrieval
//!
//! This module contains the core crawling logic, including:
//! - The [`Fetcher`] capability and its HTTP implementation
//! - HTML parsing and link extraction
//! - Robots and pacing admission control
//! - Bounded retry for pages that render late
//! - The [`CrawlEngine`] that drives a run

mod engine;
mod fetcher;
mod parser;
mod policy;
mod retry;

pub use engine::CrawlEngine;
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use parser::{
    contains_selector, find_consent_button, strip_scripts, ExtractionError,
    HtmlLinkExtractor, LinkExtractor,
};
pub use policy::PolicyGate;
pub use retry::{fetch_with_retry, FetchAttempt, RetryPolicy, RetryState};
