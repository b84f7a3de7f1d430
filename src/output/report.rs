//! Crawl run results
//!
//! A [`CrawlReport`] is what [`CrawlEngine::run`](crate::CrawlEngine::run)
//! returns: the saved index, assets, external references and every per-URL
//! failure, plus how the run ended.

use crate::crawler::FetchError;
use crate::output::IndexEntry;
use crate::url::CanonicalUrl;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Why a URL produced no saved resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    /// robots.txt disallowed the fetch
    PolicyDenied,
    /// The fetch exceeded its deadline
    Timeout,
    /// Connection, DNS, TLS or body read failure
    Transport,
    /// Non-success HTTP status
    HttpStatus,
    /// The page never became ready within the retry bound
    RenderExhausted,
    /// The content was fetched but could not be persisted
    Sink,
}

impl FailureKind {
    /// Maps a fetch error to its failure kind
    pub fn from_fetch_error(error: &FetchError) -> Self {
        match error {
            FetchError::Timeout => Self::Timeout,
            FetchError::Transport(_) => Self::Transport,
            FetchError::HttpStatus(_) => Self::HttpStatus,
            FetchError::RenderIncomplete => Self::RenderExhausted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyDenied => "policy_denied",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::HttpStatus => "http_status",
            Self::RenderExhausted => "render_exhausted",
            Self::Sink => "sink",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "policy_denied" => Some(Self::PolicyDenied),
            "timeout" => Some(Self::Timeout),
            "transport" => Some(Self::Transport),
            "http_status" => Some(Self::HttpStatus),
            "render_exhausted" => Some(Self::RenderExhausted),
            "sink" => Some(Self::Sink),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL that was skipped, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: CanonicalUrl,
    pub kind: FailureKind,
    pub message: String,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The frontier was exhausted or the page cap was reached
    Completed,
    /// The cancellation signal stopped dispatch; partial results were persisted
    Cancelled,
    /// The seed could not be normalized, was denied, or could not be fetched
    SeedRejected { reason: String },
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::SeedRejected { .. } => "seed_rejected",
        }
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SeedRejected { .. } => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeedRejected { reason } => write!(f, "seed rejected: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Everything a crawl run produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub seed: String,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Saved pages in the order their fetches completed
    pub index: Vec<IndexEntry>,

    /// Saved assets
    pub assets: Vec<IndexEntry>,

    /// Distinct external references, in discovery order
    pub external_links: Vec<CanonicalUrl>,

    pub failures: Vec<FailureRecord>,

    /// Size of the visited set when the run ended
    pub visited: usize,

    /// Contents of the visited set when the run ended, sorted
    pub visited_urls: Vec<CanonicalUrl>,

    /// Admitted pages that were never dispatched (cancellation or page cap)
    pub frontier_remaining: usize,

    pub batches: usize,
}

impl CrawlReport {
    /// Creates an empty report for a run starting now
    pub fn new(seed: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            seed: seed.into(),
            outcome: RunOutcome::Completed,
            started_at: now,
            finished_at: now,
            index: Vec::new(),
            assets: Vec::new(),
            external_links: Vec::new(),
            failures: Vec::new(),
            visited: 0,
            visited_urls: Vec::new(),
            frontier_remaining: 0,
            batches: 0,
        }
    }

    /// Returns the number of pages saved
    pub fn pages_saved(&self) -> usize {
        self.index.len()
    }

    /// Returns failure counts per kind
    pub fn failures_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns external reference counts per host
    pub fn external_hosts(&self) -> BTreeMap<String, usize> {
        let mut hosts = BTreeMap::new();
        for url in &self.external_links {
            *hosts.entry(url.host().to_string()).or_insert(0) += 1;
        }
        hosts
    }

    /// Returns the run duration in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

/// Prints a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Run:");
    println!("  Seed: {}", report.seed);
    println!("  Outcome: {}", report.outcome);
    println!("  Duration: {}s", report.duration_seconds());
    println!("  Batches: {}", report.batches);
    println!();

    println!("Overview:");
    println!("  URLs visited: {}", report.visited);
    println!("  Pages saved: {}", report.pages_saved());
    println!("  Assets saved: {}", report.assets.len());
    println!("  External links: {}", report.external_links.len());
    println!("  Failures: {}", report.failures.len());
    if report.frontier_remaining > 0 {
        println!("  Not dispatched: {}", report.frontier_remaining);
    }
    println!();

    let failures = report.failures_by_kind();
    if !failures.is_empty() {
        println!("Failures by Kind:");
        let mut counts: Vec<_> = failures.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let hosts = report.external_hosts();
    if !hosts.is_empty() {
        println!("External Hosts ({}):", hosts.len());
        for (host, count) in hosts.iter().take(20) {
            println!("  - {} ({})", host, count);
        }
        println!();
    }
}
