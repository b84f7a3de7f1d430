/// Traversal phases of a crawl run
///
/// The engine moves through these in a fixed order and loops over
/// `Draining -> Fetching -> Extracting -> Enqueuing` until the frontier is
/// empty or the run is cancelled.
use std::fmt;

/// Represents where a crawl run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Engine constructed, `run` not yet called
    Idle,

    /// Normalizing and admitting the seed URL
    Seeding,

    /// Pulling the next batch from the frontier
    Draining,

    /// Fetching every URL of the current batch
    Fetching,

    /// Running link extraction over fetched pages
    Extracting,

    /// Normalizing, classifying and admitting candidates
    Enqueuing,

    /// Persisting the saved index
    Finalizing,

    /// Run finished; terminal
    Done,
}

impl CrawlPhase {
    /// Returns true if the engine may move from `self` to `next`
    ///
    /// Any non-terminal phase past seeding may jump to `Finalizing` so a
    /// cancelled run still persists its index. `Seeding` may jump straight to
    /// `Done` when the seed is rejected.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        match (self, next) {
            (Idle, Seeding) => true,
            (Seeding, Draining) | (Seeding, Done) => true,
            (Draining, Fetching) => true,
            (Fetching, Extracting) => true,
            (Extracting, Enqueuing) => true,
            (Enqueuing, Draining) => true,
            (Draining | Fetching | Extracting | Enqueuing, Finalizing) => true,
            (Finalizing, Done) => true,
            _ => false,
        }
    }

    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the lowercase name used in logs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Draining => "draining",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Enqueuing => "enqueuing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }

    /// Returns all phases in traversal order
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Idle,
            Self::Seeding,
            Self::Draining,
            Self::Fetching,
            Self::Extracting,
            Self::Enqueuing,
            Self::Finalizing,
            Self::Done,
        ]
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
