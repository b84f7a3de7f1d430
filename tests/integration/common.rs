//! In-memory fetcher and sink used by the engine tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tidewalk::crawler::{FetchError, FetchedPage, Fetcher};
use tidewalk::output::{IndexEntry, SavedKind, Sink, SinkError};
use tidewalk::{CanonicalUrl, Config};
use tokio_util::sync::CancellationToken;

enum Response {
    Html(String),
    Asset(&'static str, Vec<u8>),
    Fail(FetchError),
    Hang,
    NeverReady,
}

/// A fake site keyed by canonical URL string; unknown URLs are 404
#[derive(Default)]
pub struct FakeSite {
    responses: HashMap<String, Response>,
    rendering: bool,
    serial: bool,
    cancel_on: Option<(String, CancellationToken)>,
    fetches: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closed: AtomicUsize,
    prepared: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), Response::Html(body.to_string()));
        self
    }

    pub fn asset(mut self, url: &str, content_type: &'static str, body: &[u8]) -> Self {
        self.responses
            .insert(url.to_string(), Response::Asset(content_type, body.to_vec()));
        self
    }

    pub fn robots(self, host: &str, body: &str) -> Self {
        self.asset(&format!("https://{}/robots.txt", host), "text/plain", body.as_bytes())
    }

    pub fn fail(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Response::Fail(error));
        self
    }

    /// The fetch never completes on its own
    pub fn hang(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Hang);
        self
    }

    /// Always reports the page as not yet rendered
    pub fn never_ready(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::NeverReady);
        self.rendering = true;
        self
    }

    /// Marks the fetcher as non-reentrant, like a single browser session
    pub fn serial(mut self) -> Self {
        self.serial = true;
        self
    }

    /// Cancels `token` when `url` is fetched
    pub fn cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.to_string(), token));
        self
    }

    /// Every non-robots fetch, in call order
    pub fn fetches(&self) -> Vec<String> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !u.ends_with("/robots.txt"))
            .cloned()
            .collect()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn prepared(&self) -> Vec<String> {
        self.prepared.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &CanonicalUrl, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.fetches.lock().unwrap().push(url.to_string());

        if let Some((target, token)) = &self.cancel_on {
            if target == url.as_str() {
                token.cancel();
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Give overlapping workers a chance to show up in max_in_flight
        tokio::time::sleep(Duration::from_millis(5)).await;

        let result = match self.responses.get(url.as_str()) {
            Some(Response::Html(body)) => Ok(FetchedPage::html(url, body.clone())),
            Some(Response::Asset(content_type, body)) => {
                let mut page = FetchedPage::html(url, "");
                page.content_type = Some(content_type.to_string());
                page.body = body.clone();
                Ok(page)
            }
            Some(Response::Fail(error)) => Err(error.clone()),
            Some(Response::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Transport("unreachable".to_string()))
            }
            Some(Response::NeverReady) => Err(FetchError::RenderIncomplete),
            None => Err(FetchError::HttpStatus(404)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn supports_rendering(&self) -> bool {
        self.rendering
    }

    fn is_reentrant(&self) -> bool {
        !self.serial
    }

    async fn prepare_extraction(&self, page: &FetchedPage) {
        self.prepared.lock().unwrap().push(page.url.to_string());
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keeps everything in memory
#[derive(Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(String, SavedKind, Vec<u8>)>>,
    names: Mutex<HashSet<String>>,
    index: Mutex<Option<Vec<IndexEntry>>>,
    flushes: AtomicUsize,
    fail_on: Option<String>,
    fail_flush: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `save` fails for this URL
    pub fn failing_on(url: &str) -> Self {
        Self {
            fail_on: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_flush() -> Self {
        let sink = Self::default();
        sink.fail_flush.store(true, Ordering::SeqCst);
        sink
    }

    pub fn saved_urls(&self, kind: SavedKind) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(u, _, _)| u.clone())
            .collect()
    }

    pub fn content_of(&self, url: &str) -> Option<Vec<u8>> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _, _)| u == url)
            .map(|(_, _, c)| c.clone())
    }

    pub fn flushed_index(&self) -> Option<Vec<IndexEntry>> {
        self.index.lock().unwrap().clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn save(
        &self,
        url: &CanonicalUrl,
        content: &[u8],
        kind: SavedKind,
    ) -> Result<String, SinkError> {
        if self.fail_on.as_deref() == Some(url.as_str()) {
            return Err(SinkError::Write("disk full".to_string()));
        }

        let name = format!("{}:{}", kind, url);
        assert!(
            self.names.lock().unwrap().insert(name.clone()),
            "{} saved twice",
            url
        );
        self.saved
            .lock()
            .unwrap()
            .push((url.to_string(), kind, content.to_vec()));
        Ok(name)
    }

    async fn flush_index(&self, entries: &[IndexEntry]) -> Result<(), SinkError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(SinkError::Write("read-only filesystem".to_string()));
        }
        *self.index.lock().unwrap() = Some(entries.to_vec());
        Ok(())
    }
}

/// Fast, robots-bypassing configuration for `seed`
pub fn test_config(seed: &str) -> Config {
    let mut config = Config::with_seed(seed);
    config.robots.bypass = true;
    config.crawler.delay_ms = 0;
    config.crawler.batch_size = 10;
    config.crawler.workers = Some(4);
    config.crawler.fetch_timeout_secs = 1;
    config.crawler.render_wait_secs = 1;
    config.crawler.render_backoff_ms = 1;
    config
}
