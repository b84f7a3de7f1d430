use crate::url::CanonicalUrl;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Set of canonical URLs already dispatched for fetch or enqueued
///
/// The set only grows during a run. [`VisitedSet::try_admit`] is the only way
/// in, and it checks and inserts under one lock, so concurrent callers that
/// discover the same link still admit it exactly once.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<CanonicalUrl>>,
}

impl VisitedSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `url` if it has not been seen before
    ///
    /// # Returns
    ///
    /// * `true` - The URL was absent and is now recorded
    /// * `false` - The URL was already present; nothing changed
    pub fn try_admit(&self, url: &CanonicalUrl) -> bool {
        let mut urls = self.lock();
        if urls.contains(url) {
            return false;
        }
        urls.insert(url.clone())
    }

    /// Returns true if `url` has been admitted
    pub fn contains(&self, url: &CanonicalUrl) -> bool {
        self.lock().contains(url)
    }

    /// Returns the number of admitted URLs
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether nothing has been admitted yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns all admitted URLs in sorted order
    pub fn snapshot(&self) -> Vec<CanonicalUrl> {
        let mut urls: Vec<_> = self.lock().iter().cloned().collect();
        urls.sort();
        urls
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<CanonicalUrl>> {
        // A panicking holder cannot leave the set half-updated: insert is the only mutation
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
