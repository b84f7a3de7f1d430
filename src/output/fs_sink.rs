//! Filesystem sink
//!
//! Saves each resource as a file under `<directory>/<host>/` (see
//! [`SavedNames`] for the naming scheme) and writes a navigable
//! `<directory>/index.html` at the end of the run.

use crate::output::naming::SavedNames;
use crate::output::{IndexEntry, SavedKind, Sink, SinkError};
use crate::url::CanonicalUrl;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Title of the generated index page
const INDEX_TITLE: &str = "Crawled Pages Index";

/// Writes crawl output as plain files
#[derive(Debug)]
pub struct FsSink {
    root: PathBuf,
    names: SavedNames,
}

impl FsSink {
    /// Creates a sink rooted at `root`; directories are created on first save
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            names: SavedNames::new(),
        }
    }

    /// Returns the output root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the index page
    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.html")
    }
}

#[async_trait]
impl Sink for FsSink {
    async fn save(
        &self,
        url: &CanonicalUrl,
        content: &[u8],
        kind: SavedKind,
    ) -> Result<String, SinkError> {
        let name = self.names.reserve(url, kind);
        let path = self.root.join(&name);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        tracing::debug!(url = %url, saved = %name, bytes = content.len(), "Saved resource");
        Ok(name)
    }

    async fn flush_index(&self, entries: &[IndexEntry]) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.index_path(), render_index(entries)).await?;

        tracing::info!(
            path = %self.index_path().display(),
            pages = entries.len(),
            "Wrote index"
        );
        Ok(())
    }
}

/// Renders the index page listing every saved page in order
pub fn render_index(entries: &[IndexEntry]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", INDEX_TITLE));
    html.push_str(&format!("<h1>{}</h1>\n<ul>\n", INDEX_TITLE));

    for entry in entries {
        html.push_str(&format!(
            "<li><a href=\"{}\" target=\"_blank\">{}</a></li>\n",
            escape_html(&entry.saved_name),
            escape_html(entry.url.as_str())
        ));
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
