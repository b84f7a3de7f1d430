use crate::url::CanonicalUrl;
use std::collections::VecDeque;

/// FIFO queue of canonical URLs awaiting fetch
///
/// Duplicate suppression is not done here: callers push only URLs that
/// [`VisitedSet::try_admit`](crate::state::VisitedSet::try_admit) accepted.
/// Draining in arrival order gives breadth-first traversal.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<CanonicalUrl>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `url` to the tail
    pub fn push(&mut self, url: CanonicalUrl) {
        self.queue.push_back(url);
    }

    /// Pops up to `max_size` entries from the head in FIFO order
    ///
    /// An empty result means the frontier is exhausted; it is the traversal
    /// loop's termination signal, not an error.
    pub fn drain_batch(&mut self, max_size: usize) -> Vec<CanonicalUrl> {
        let take = max_size.min(self.queue.len());
        self.queue.drain(..take).collect()
    }

    /// Returns the number of queued URLs
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
