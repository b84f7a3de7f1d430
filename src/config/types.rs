use crate::url::DEFAULT_ASSET_EXTENSIONS;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Tidewalk
///
/// Only `seed` is required; every section falls back to its defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The start URL; its host is the crawl origin
    pub seed: String,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Creates a configuration with every default and the given seed
    pub fn with_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            crawler: CrawlerConfig::default(),
            scope: ScopeConfig::default(),
            robots: RobotsConfig::default(),
            fetcher: FetcherConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Traversal loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of URLs drained from the frontier per iteration
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Number of fetches allowed in flight at once; defaults to `batch-size`
    pub workers: Option<usize>,

    /// Minimum time between fetch dispatches (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Per-fetch deadline (seconds)
    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound on waiting for a page to render (seconds)
    #[serde(rename = "render-wait-secs")]
    pub render_wait_secs: u64,

    /// Attempts for a page that needs dynamic rendering, including the first
    #[serde(rename = "max-render-attempts")]
    pub max_render_attempts: u32,

    /// Backoff before the second render attempt (milliseconds); doubles after
    #[serde(rename = "render-backoff-ms")]
    pub render_backoff_ms: u64,

    /// Stop dispatching page fetches after this many; 0 means unbounded
    #[serde(rename = "max-pages")]
    pub max_pages: usize,
}

impl CrawlerConfig {
    /// Returns the worker pool size, falling back to the batch size
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(self.batch_size)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            workers: None,
            delay_ms: 1000,
            fetch_timeout_secs: 10,
            render_wait_secs: 20,
            max_render_attempts: 3,
            render_backoff_ms: 500,
            max_pages: 0,
        }
    }
}

/// What counts as in scope for the crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Extensions (without the dot) classified as downloadable assets
    #[serde(rename = "asset-extensions")]
    pub asset_extensions: Vec<String>,

    /// Fetch and save external pages without following their links
    #[serde(rename = "follow-external")]
    pub follow_external: bool,

    /// Cap on external pages fetched when `follow-external` is set
    #[serde(rename = "max-external-pages")]
    pub max_external_pages: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            asset_extensions: DEFAULT_ASSET_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_external: false,
            max_external_pages: 50,
        }
    }
}

/// Robots exclusion configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    /// Skip robots.txt entirely
    pub bypass: bool,

    /// User-Agent header; its product token is matched against robots.txt groups
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            bypass: false,
            user_agent: "tidewalk/0.1".to_string(),
        }
    }
}

/// HTTP fetcher behavior
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// CSS selector that must be present before a page counts as rendered
    #[serde(rename = "ready-selector")]
    pub ready_selector: Option<String>,

    /// Log acceptance of consent banners before extraction
    #[serde(rename = "simulate-consent")]
    pub simulate_consent: bool,

    /// Remove script and style elements from saved pages
    #[serde(rename = "strip-scripts")]
    pub strip_scripts: bool,
}

/// Where crawl results go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One file per resource plus index.html
    #[default]
    Files,
    /// A SQLite database with crawl history
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Root directory for the files sink
    pub directory: PathBuf,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Files,
            directory: PathBuf::from("./crawl"),
            database_path: PathBuf::from("./crawl.db"),
            summary_path: None,
        }
    }
}
