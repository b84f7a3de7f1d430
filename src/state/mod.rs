//! State module for tracking crawl progress
//!
//! This module provides the process-scoped state owned by one crawl run.
//!
//! # Components
//!
//! - `VisitedSet`: Canonical URLs already admitted; the single at-most-once gate
//! - `Frontier`: FIFO queue of admitted pages awaiting fetch
//! - `CrawlPhase`: The engine's traversal state machine

mod crawl_phase;
mod frontier;
mod visited;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use frontier::Frontier;
pub use visited::VisitedSet;
