//! Saved-name generation shared by the sinks
//!
//! # Saved names
//!
//! | Resource | Name |
//! |----------|------|
//! | `https://h/` | `h/scraped_index.html` |
//! | `https://h/docs/intro?v=2` | `h/scraped_docs_intro_v_2.html` |
//! | `https://h/img/logo.png` | `h/asset_img_logo.png` |
//!
//! A name already used in the run gets a `_2`, `_3`, ... suffix.

use crate::output::SavedKind;
use crate::url::CanonicalUrl;
use std::collections::HashSet;
use std::sync::Mutex;

/// Stems longer than this are truncated to stay under filesystem name limits
const MAX_STEM_LEN: usize = 180;

/// Hands out names that are unique within one run
#[derive(Debug, Default)]
pub struct SavedNames {
    used: Mutex<HashSet<String>>,
}

impl SavedNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a unique `<host>/<stem>.<ext>` name for `url`
    pub fn reserve(&self, url: &CanonicalUrl, kind: SavedKind) -> String {
        let folder = host_folder(url);
        let (stem, ext) = match kind {
            SavedKind::Asset => asset_name_parts(url),
            SavedKind::Page | SavedKind::ExternalPage => (page_stem(url), "html".to_string()),
        };

        let mut used = self.used.lock().unwrap_or_else(|p| p.into_inner());
        let mut candidate = format!("{}/{}.{}", folder, stem, ext);
        let mut counter = 2;
        while used.contains(&candidate) {
            candidate = format!("{}/{}_{}.{}", folder, stem, counter, ext);
            counter += 1;
        }
        used.insert(candidate.clone());
        candidate
    }
}

/// Folder for a URL's host; a non-default port is kept as `_port`
fn host_folder(url: &CanonicalUrl) -> String {
    let folder = match url.as_url().port() {
        Some(port) => format!("{}_{}", url.host(), port),
        None => url.host().to_string(),
    };
    sanitize(&folder, |c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

/// `scraped_<path>[_<query>]`
fn page_stem(url: &CanonicalUrl) -> String {
    let path = path_part(url.path());
    let path = if path.is_empty() { "index".to_string() } else { path };

    let stem = match query_part(url) {
        Some(query) => format!("scraped_{}_{}", path, query),
        None => format!("scraped_{}", path),
    };
    truncate(sanitize(&stem, is_name_char))
}

/// (`asset_<path>[_<query>]`, extension)
fn asset_name_parts(url: &CanonicalUrl) -> (String, String) {
    let decoded = decode(url.path());
    let (base, ext) = match decoded.rsplit_once('.') {
        Some((base, ext)) if !ext.contains('/') && !ext.is_empty() => {
            (base.to_string(), ext.to_ascii_lowercase())
        }
        _ => (decoded.clone(), "bin".to_string()),
    };

    let path = base.trim_matches('/').replace('/', "_");
    let path = if path.is_empty() { "file".to_string() } else { path };
    let stem = match query_part(url) {
        Some(query) => format!("asset_{}_{}", path, query),
        None => format!("asset_{}", path),
    };

    let ext = sanitize(&ext, |c| c.is_ascii_alphanumeric());
    (truncate(sanitize(&stem, is_name_char)), ext)
}

/// Decoded path with outer slashes stripped and inner slashes as `_`
fn path_part(path: &str) -> String {
    decode(path).trim_matches('/').replace('/', "_")
}

/// Query with every character outside `[A-Za-z0-9_]` replaced by `_`
fn query_part(url: &CanonicalUrl) -> Option<String> {
    url.query()
        .filter(|q| !q.is_empty())
        .map(|q| sanitize(q, |c| c.is_ascii_alphanumeric() || c == '_'))
}

fn decode(s: &str) -> String {
    match urlencoding::decode(s) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => s.to_string(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn sanitize(s: &str, keep: impl Fn(char) -> bool) -> String {
    s.chars().map(|c| if keep(c) { c } else { '_' }).collect()
}

fn truncate(mut stem: String) -> String {
    if stem.len() > MAX_STEM_LEN {
        // Sanitized stems are ASCII, so any byte index is a char boundary
        stem.truncate(MAX_STEM_LEN);
    }
    stem
}
