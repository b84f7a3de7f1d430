//! Storage module for persisting crawl history
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Run tracking with outcome and configuration hash
//! - Saved resource content and the ordered page index
//! - Failure and external reference records for later inspection

mod schema;
mod sink;
mod sqlite;
mod traits;

pub use sink::SqliteSink;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::output::{CrawlReport, RunOutcome, SavedKind};
use crate::TidewalkError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(TidewalkError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, TidewalkError> {
    SqliteStorage::new(path)
}

/// Writes the end-of-run parts of a report: failures, external references
/// and the final run status
pub fn record_report(
    storage: &mut dyn Storage,
    run_id: i64,
    report: &CrawlReport,
) -> StorageResult<()> {
    storage.record_failures(run_id, &report.failures)?;
    storage.record_external_links(run_id, &report.external_links)?;
    storage.finish_run(run_id, &report.outcome)?;
    Ok(())
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub seed: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub status_detail: Option<String>,
}

/// Represents a saved resource in the database
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub run_id: i64,
    pub url: String,
    pub saved_name: String,
    pub kind: SavedKind,
    pub size: u64,
    pub content: Vec<u8>,
    pub saved_at: String,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    SeedRejected,
    Failed,
}

impl RunStatus {
    /// Maps how a run ended to its stored status
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => Self::Completed,
            RunOutcome::Cancelled => Self::Cancelled,
            RunOutcome::SeedRejected { .. } => Self::SeedRejected,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::SeedRejected => "seed_rejected",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "seed_rejected" => Some(Self::SeedRejected),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
