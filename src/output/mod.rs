//! Output module for persisting crawl results
//!
//! This module handles:
//! - The [`Sink`] capability and its filesystem implementation
//! - The [`CrawlReport`] returned by a run
//! - Markdown summaries of crawl results
//! - Statistics for runs stored in the history database

mod fs_sink;
mod markdown;
mod naming;
mod report;
mod sink;
mod stats;

pub use fs_sink::{render_index, FsSink};
pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use naming::SavedNames;
pub use report::{print_report, CrawlReport, FailureKind, FailureRecord, RunOutcome};
pub use sink::{IndexEntry, SavedKind, Sink, SinkError};
pub use stats::{load_latest_statistics, load_statistics, print_statistics, RunStatistics};
