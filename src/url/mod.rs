//! URL handling module for Tidewalk
//!
//! This module provides URL canonicalization and link classification.
//! A [`CanonicalUrl`] is the unique identity used for deduplication; a
//! [`LinkReference`] pairs one with its [`LinkKind`].

mod classify;
mod normalize;

use std::borrow::Cow;
use std::fmt;
use url::Url;

// Re-export main functions
pub use classify::{classify, AssetExtensions, DEFAULT_ASSET_EXTENSIONS};
pub use normalize::normalize_url;

/// A normalized absolute http(s) URL
///
/// Only [`normalize_url`] constructs these, so two values compare equal exactly
/// when they refer to the same resource after canonicalization. The wrapped
/// URL is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the lowercase host
    ///
    /// Always non-empty: URLs without a host are rejected during normalization.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Returns the host, followed by `:port` when the port is not the scheme default
    ///
    /// URLs with equal authorities are on the same origin.
    pub fn authority(&self) -> Cow<'_, str> {
        match self.0.port() {
            Some(port) => Cow::Owned(format!("{}:{}", self.host(), port)),
            None => Cow::Borrowed(self.host()),
        }
    }

    /// Returns the path component
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Returns the query component, if any
    pub fn query(&self) -> Option<&str> {
        self.0.query()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Classification of a discovered reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Same-origin page - traversed
    Page,
    /// Same-origin file with a known asset extension - downloaded once
    Asset,
    /// Different host - recorded, not traversed by default
    External,
}

impl LinkKind {
    /// Returns true if references of this kind are fed back into the frontier
    pub fn is_traversable(&self) -> bool {
        matches!(self, Self::Page)
    }

    /// Returns a short lowercase label for reports and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Asset => "asset",
            Self::External => "external",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified outbound reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkReference {
    pub target: CanonicalUrl,
    pub kind: LinkKind,
}

impl LinkReference {
    /// Normalizes `raw` against `base` and classifies it relative to `origin`
    ///
    /// Returns `None` when the reference is not a usable http(s) URL; callers
    /// drop such references.
    pub fn resolve(
        raw: &str,
        base: &Url,
        origin: &str,
        assets: &AssetExtensions,
    ) -> Option<Self> {
        match normalize_url(raw, Some(base)) {
            Ok(target) => {
                let kind = classify(&target, origin, assets);
                Some(Self { target, kind })
            }
            Err(e) => {
                tracing::debug!(reference = raw, error = %e, "Dropping reference");
                None
            }
        }
    }
}
