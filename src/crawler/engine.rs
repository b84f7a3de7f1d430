//! The traversal engine
//!
//! One [`CrawlEngine`] owns all state for one run: the visited set, the
//! frontier, the policy gate and the report being built. The driver walks
//! the phases in [`CrawlPhase`] order; fetches inside a batch run on a bounded
//! pool of workers, everything else happens on the driver.

use crate::config::Config;
use crate::crawler::fetcher::{FetchedPage, Fetcher, HttpFetcher};
use crate::crawler::parser::{strip_scripts, HtmlLinkExtractor, LinkExtractor};
use crate::crawler::policy::PolicyGate;
use crate::crawler::retry::{fetch_with_retry, RetryPolicy};
use crate::output::{
    CrawlReport, FailureKind, FailureRecord, IndexEntry, RunOutcome, SavedKind, Sink,
};
use crate::state::{CrawlPhase, Frontier, VisitedSet};
use crate::url::{normalize_url, AssetExtensions, CanonicalUrl, LinkKind, LinkReference};
use crate::{Result, TidewalkError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One resource to fetch and save
#[derive(Debug, Clone)]
struct FetchTask {
    url: CanonicalUrl,
    kind: SavedKind,
    /// Already passed the policy gate (the seed is checked while seeding)
    admitted: bool,
}

impl FetchTask {
    fn new(url: CanonicalUrl, kind: SavedKind) -> Self {
        Self {
            url,
            kind,
            admitted: false,
        }
    }
}

/// What a worker reports back to the driver
enum FetchOutcome {
    Saved {
        page: FetchedPage,
        kind: SavedKind,
        saved_name: String,
    },
    Failed(FailureRecord),
    /// Cancellation arrived before the fetch was dispatched
    NotDispatched,
}

/// Bounded-domain crawler for a single run
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tidewalk::output::FsSink;
/// use tidewalk::{Config, CrawlEngine};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() -> tidewalk::Result<()> {
/// let config = Config::with_seed("https://example.com/");
/// let sink = Arc::new(FsSink::new("./crawl"));
/// let engine = CrawlEngine::from_config(&config, sink)?;
/// let report = engine.run(CancellationToken::new()).await?;
/// println!("saved {} pages", report.pages_saved());
/// # Ok(())
/// # }
/// ```
pub struct CrawlEngine {
    seed_raw: String,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn LinkExtractor>,
    sink: Arc<dyn Sink>,
    policy: PolicyGate,
    retry: RetryPolicy,
    assets: AssetExtensions,

    batch_size: usize,
    workers: usize,
    fetch_timeout: Duration,
    max_pages: usize,
    follow_external: bool,
    max_external_pages: usize,
    strip_scripts: bool,

    phase: CrawlPhase,
    seed: Option<CanonicalUrl>,
    origin: String,
    visited: VisitedSet,
    frontier: Frontier,
    external_seen: HashSet<CanonicalUrl>,
    external_admitted: usize,
    pages_dispatched: usize,
    report: CrawlReport,
}

impl CrawlEngine {
    /// Creates an engine over the given capabilities
    ///
    /// A fetcher that is not reentrant gets a single worker regardless of
    /// the configured pool size.
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn LinkExtractor>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        let crawler = &config.crawler;

        let workers = if fetcher.is_reentrant() {
            crawler.effective_workers().max(1)
        } else {
            1
        };

        let mut fetch_timeout = Duration::from_secs(crawler.fetch_timeout_secs);
        if fetcher.supports_rendering() {
            fetch_timeout = fetch_timeout.max(Duration::from_secs(crawler.render_wait_secs));
        }

        Self {
            seed_raw: config.seed.clone(),
            policy: PolicyGate::new(config, fetcher.clone()),
            fetcher,
            extractor,
            sink,
            retry: RetryPolicy::from_config(crawler),
            assets: AssetExtensions::new(&config.scope.asset_extensions),
            batch_size: crawler.batch_size.max(1),
            workers,
            fetch_timeout,
            max_pages: crawler.max_pages,
            follow_external: config.scope.follow_external,
            max_external_pages: config.scope.max_external_pages,
            strip_scripts: config.fetcher.strip_scripts,
            phase: CrawlPhase::Idle,
            seed: None,
            origin: String::new(),
            visited: VisitedSet::new(),
            frontier: Frontier::new(),
            external_seen: HashSet::new(),
            external_admitted: 0,
            pages_dispatched: 0,
            report: CrawlReport::new(config.seed.clone()),
        }
    }

    /// Creates an engine with the HTTP fetcher and HTML link extractor
    pub fn from_config(config: &Config, sink: Arc<dyn Sink>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(config)?);
        Ok(Self::new(
            config,
            fetcher,
            Arc::new(HtmlLinkExtractor::new()),
            sink,
        ))
    }

    /// Returns the current traversal phase
    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// Per-URL failures end up in the returned report. The only errors
    /// returned here are an invalid phase transition and a failure to flush
    /// the index. The fetcher is closed on every path.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<CrawlReport> {
        let result = self.drive(&cancel).await;
        self.fetcher.close().await;
        result?;
        Ok(self.finish())
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.transition(CrawlPhase::Seeding)?;

        let seed = match self.seed_frontier().await {
            Ok(seed) => seed,
            Err(reason) => {
                tracing::warn!(seed = %self.seed_raw, reason = %reason, "Seed rejected");
                self.report.outcome = RunOutcome::SeedRejected { reason };
                return self.transition(CrawlPhase::Done);
            }
        };

        tracing::info!(
            seed = %seed,
            origin = %self.origin,
            batch_size = self.batch_size,
            workers = self.workers,
            "Starting crawl"
        );

        loop {
            self.transition(CrawlPhase::Draining)?;

            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping dispatch");
                break;
            }

            let budget = self.batch_budget();
            if budget == 0 {
                tracing::info!(max_pages = self.max_pages, "Page limit reached");
                break;
            }

            let batch = self.frontier.drain_batch(budget);
            if batch.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }
            self.report.batches += 1;

            self.transition(CrawlPhase::Fetching)?;
            let tasks: Vec<FetchTask> = batch.into_iter().map(|url| self.page_task(url)).collect();
            self.pages_dispatched += tasks.iter().filter(|t| t.kind == SavedKind::Page).count();
            let outcomes = self.dispatch(tasks, cancel).await;
            let fetched = self.record_outcomes(outcomes);

            self.transition(CrawlPhase::Extracting)?;
            let discovered = self.extract_links(&fetched).await;

            self.transition(CrawlPhase::Enqueuing)?;
            self.enqueue(discovered, cancel).await;

            tracing::info!(
                batch = self.report.batches,
                pages_saved = self.report.index.len(),
                failures = self.report.failures.len(),
                frontier = self.frontier.len(),
                "Batch complete"
            );
        }

        self.transition(CrawlPhase::Finalizing)?;

        if cancel.is_cancelled() && self.report.outcome == RunOutcome::Completed {
            self.report.outcome = RunOutcome::Cancelled;
        }

        self.sink.flush_index(&self.report.index).await?;

        self.transition(CrawlPhase::Done)
    }

    /// Normalizes and admits the seed; the error is the rejection reason
    async fn seed_frontier(&mut self) -> std::result::Result<CanonicalUrl, String> {
        let seed = normalize_url(&self.seed_raw, None)
            .map_err(|e| format!("invalid seed URL: {}", e))?;
        self.origin = seed.authority().into_owned();

        if !self.policy.admit(&seed).await {
            self.report.failures.push(FailureRecord {
                url: seed.clone(),
                kind: FailureKind::PolicyDenied,
                message: "disallowed by robots.txt".to_string(),
            });
            return Err(format!("{} is disallowed by robots.txt", seed));
        }

        self.visited.try_admit(&seed);
        self.frontier.push(seed.clone());
        self.seed = Some(seed.clone());
        Ok(seed)
    }

    /// How many URLs the next batch may take
    fn batch_budget(&self) -> usize {
        if self.max_pages == 0 {
            self.batch_size
        } else {
            self.batch_size
                .min(self.max_pages.saturating_sub(self.pages_dispatched))
        }
    }

    fn page_task(&self, url: CanonicalUrl) -> FetchTask {
        let kind = if url.authority() == self.origin {
            SavedKind::Page
        } else {
            SavedKind::ExternalPage
        };
        let admitted = self.seed.as_ref() == Some(&url);
        FetchTask {
            url,
            kind,
            admitted,
        }
    }

    /// Runs `tasks` on the worker pool; outcomes arrive in completion order
    async fn dispatch(&self, tasks: Vec<FetchTask>, cancel: &CancellationToken) -> Vec<FetchOutcome> {
        stream::iter(tasks)
            .map(|task| self.fetch_and_save(task, cancel))
            .buffer_unordered(self.workers)
            .collect::<Vec<_>>()
            .await
    }

    async fn fetch_and_save(&self, task: FetchTask, cancel: &CancellationToken) -> FetchOutcome {
        if cancel.is_cancelled() {
            return FetchOutcome::NotDispatched;
        }

        if !task.admitted && !self.policy.admit(&task.url).await {
            return FetchOutcome::Failed(FailureRecord {
                url: task.url,
                kind: FailureKind::PolicyDenied,
                message: "disallowed by robots.txt".to_string(),
            });
        }

        tokio::select! {
            _ = self.policy.pace() => {}
            _ = cancel.cancelled() => return FetchOutcome::NotDispatched,
        }

        tracing::debug!(url = %task.url, kind = %task.kind, "Fetching");
        let attempt = fetch_with_retry(
            self.fetcher.as_ref(),
            &task.url,
            self.fetch_timeout,
            &self.retry,
            cancel,
        )
        .await;

        let page = match attempt.result {
            Ok(page) => page,
            Err(error) => {
                let message = if attempt.attempts > 1 {
                    format!("{} (after {} attempts)", error, attempt.attempts)
                } else {
                    error.to_string()
                };
                return FetchOutcome::Failed(FailureRecord {
                    url: task.url,
                    kind: FailureKind::from_fetch_error(&error),
                    message,
                });
            }
        };

        let content = self.saved_content(&page, task.kind);
        match self.sink.save(&task.url, &content, task.kind).await {
            Ok(saved_name) => FetchOutcome::Saved {
                page,
                kind: task.kind,
                saved_name,
            },
            Err(e) => FetchOutcome::Failed(FailureRecord {
                url: task.url,
                kind: FailureKind::Sink,
                message: e.to_string(),
            }),
        }
    }

    fn saved_content<'a>(&self, page: &'a FetchedPage, kind: SavedKind) -> Cow<'a, [u8]> {
        if self.strip_scripts && kind != SavedKind::Asset && page.is_html() {
            Cow::Owned(strip_scripts(&page.text()).into_bytes())
        } else {
            Cow::Borrowed(&page.body)
        }
    }

    /// Folds worker outcomes into the report
    ///
    /// Returns the same-origin pages whose links should be followed.
    fn record_outcomes(&mut self, outcomes: Vec<FetchOutcome>) -> Vec<FetchedPage> {
        let mut follow = Vec::new();

        for outcome in outcomes {
            match outcome {
                FetchOutcome::Saved {
                    page,
                    kind,
                    saved_name,
                } => {
                    let entry = IndexEntry {
                        saved_name,
                        url: page.url.clone(),
                    };
                    match kind {
                        SavedKind::Asset => self.report.assets.push(entry),
                        SavedKind::ExternalPage => self.report.index.push(entry),
                        SavedKind::Page => {
                            self.report.index.push(entry);
                            follow.push(page);
                        }
                    }
                }
                FetchOutcome::Failed(failure) => {
                    tracing::warn!(
                        url = %failure.url,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Skipping URL"
                    );
                    if self.seed.as_ref() == Some(&failure.url) {
                        self.report.outcome = RunOutcome::SeedRejected {
                            reason: failure.message.clone(),
                        };
                    }
                    self.report.failures.push(failure);
                }
                FetchOutcome::NotDispatched => self.report.frontier_remaining += 1,
            }
        }

        follow
    }

    /// Runs the extraction hook and the link extractor over fetched pages
    async fn extract_links(&self, pages: &[FetchedPage]) -> Vec<(Url, Vec<String>)> {
        let mut discovered = Vec::with_capacity(pages.len());

        for page in pages {
            self.fetcher.prepare_extraction(page).await;

            if !page.is_html() {
                continue;
            }

            match self.extractor.extract(&page.text(), &page.final_url) {
                Ok(references) => discovered.push((page.final_url.clone(), references)),
                Err(e) => {
                    tracing::warn!(url = %page.url, error = %e, "Treating page as having no links")
                }
            }
        }

        discovered
    }

    /// Classifies discovered references and routes each one
    ///
    /// Pages go to the frontier, assets are downloaded right away, and external
    /// references are recorded (and queued only under bounded external crawling).
    async fn enqueue(&mut self, discovered: Vec<(Url, Vec<String>)>, cancel: &CancellationToken) {
        let mut asset_tasks = Vec::new();

        for (base, references) in discovered {
            for raw in references {
                let Some(link) =
                    LinkReference::resolve(&raw, &base, &self.origin, &self.assets)
                else {
                    continue;
                };

                match link.kind {
                    LinkKind::Page => {
                        if self.visited.try_admit(&link.target) {
                            self.frontier.push(link.target);
                        }
                    }
                    LinkKind::Asset => {
                        if self.visited.try_admit(&link.target) {
                            asset_tasks.push(FetchTask::new(link.target, SavedKind::Asset));
                        }
                    }
                    LinkKind::External => self.record_external(link.target),
                }
            }
        }

        if !asset_tasks.is_empty() {
            tracing::debug!(count = asset_tasks.len(), "Downloading assets");
            let outcomes = self.dispatch(asset_tasks, cancel).await;
            self.record_outcomes(outcomes);
        }
    }

    fn record_external(&mut self, target: CanonicalUrl) {
        if !self.external_seen.insert(target.clone()) {
            return;
        }
        self.report.external_links.push(target.clone());

        if self.follow_external
            && self.external_admitted < self.max_external_pages
            && !self.assets.matches(target.path())
            && self.visited.try_admit(&target)
        {
            self.external_admitted += 1;
            self.frontier.push(target);
        }
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(TidewalkError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
        Ok(())
    }

    fn finish(mut self) -> CrawlReport {
        self.report.visited = self.visited.len();
        self.report.visited_urls = self.visited.snapshot();
        self.report.frontier_remaining += self.frontier.len();
        self.report.finished_at = Utc::now();

        tracing::info!(
            outcome = %self.report.outcome,
            pages_saved = self.report.index.len(),
            assets_saved = self.report.assets.len(),
            external_links = self.report.external_links.len(),
            failures = self.report.failures.len(),
            visited = self.report.visited,
            "Crawl finished"
        );

        self.report
    }
}
