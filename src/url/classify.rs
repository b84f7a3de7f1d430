use crate::url::{CanonicalUrl, LinkKind};
use std::collections::HashSet;

/// File extensions treated as downloadable assets when no list is configured
///
/// Covers documents, stylesheets, scripts, images, fonts and common media.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "css", "js", "mjs", "png", "jpg",
    "jpeg", "gif", "svg", "webp", "ico", "bmp", "woff", "woff2", "ttf", "otf", "eot", "mp3",
    "mp4", "webm", "json", "xml", "txt", "csv",
];

/// A case-insensitive set of asset file extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetExtensions {
    extensions: HashSet<String>,
}

impl AssetExtensions {
    /// Builds a set from extension names given without the leading dot
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Returns true if the last segment of `path` carries a listed extension
    pub fn matches(&self, path: &str) -> bool {
        let segment = path.rsplit('/').next().unwrap_or(path);
        match segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                self.extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for AssetExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_EXTENSIONS)
    }
}

/// Classifies a canonical URL relative to the crawl origin
///
/// Checked in order:
/// 1. Authority (host plus any non-default port) differs from `origin`
///    (exact match, no subdomain folding) → External
/// 2. Path ends with a configured asset extension → Asset
/// 3. Otherwise → Page
///
/// # Examples
///
/// ```
/// use tidewalk::url::{classify, normalize_url, AssetExtensions, LinkKind};
///
/// let assets = AssetExtensions::default();
/// let logo = normalize_url("https://example.com/img/logo.png", None).unwrap();
/// assert_eq!(classify(&logo, "example.com", &assets), LinkKind::Asset);
/// ```
pub fn classify(url: &CanonicalUrl, origin: &str, assets: &AssetExtensions) -> LinkKind {
    if url.authority() != origin {
        return LinkKind::External;
    }

    if assets.matches(url.path()) {
        LinkKind::Asset
    } else {
        LinkKind::Page
    }
}
