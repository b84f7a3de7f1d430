//! The persistence capability used by the crawl engine

use crate::url::CanonicalUrl;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while persisting crawl output
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to write output: {0}")]
    Write(String),
}

/// What kind of resource is being saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SavedKind {
    /// A same-origin page
    Page,
    /// A same-origin asset, saved with its original extension
    Asset,
    /// A page on another host, fetched under bounded external crawling
    ExternalPage,
}

impl SavedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Asset => "asset",
            Self::ExternalPage => "external_page",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "page" => Some(Self::Page),
            "asset" => Some(Self::Asset),
            "external_page" => Some(Self::ExternalPage),
            _ => None,
        }
    }
}

impl fmt::Display for SavedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved resource: where it came from and what the sink called it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub saved_name: String,
    pub url: CanonicalUrl,
}

/// Persists fetched content and, at the end of a run, the index of saved pages
///
/// `save` is called from concurrent fetch workers and must return a name that
/// is unique within the run.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persists `content` fetched from `url` and returns the name it was saved under
    async fn save(
        &self,
        url: &CanonicalUrl,
        content: &[u8],
        kind: SavedKind,
    ) -> Result<String, SinkError>;

    /// Persists the ordered list of saved pages
    ///
    /// Called exactly once per run that gets past seeding.
    async fn flush_index(&self, entries: &[IndexEntry]) -> Result<(), SinkError>;
}
