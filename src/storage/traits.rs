//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::output::{FailureKind, FailureRecord, IndexEntry, RunOutcome, SavedKind};
use crate::storage::{ResourceRecord, RunRecord};
use crate::url::CanonicalUrl;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl history backends
///
/// Writes happen during a run through the SQLite sink; reads back the
/// `--stats` command.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    ///
    /// # Arguments
    ///
    /// * `seed` - The seed URL as configured
    /// * `config_hash` - Hash of the configuration file
    fn create_run(&mut self, seed: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Gets every run, newest first
    fn list_runs(&self) -> StorageResult<Vec<RunRecord>>;

    /// Records how a run ended, with a finish timestamp
    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()>;

    /// Marks a run that stopped on a fatal error
    fn mark_failed(&mut self, run_id: i64, detail: &str) -> StorageResult<()>;

    // ===== Resources =====

    /// Stores one saved resource
    fn insert_resource(
        &mut self,
        run_id: i64,
        url: &CanonicalUrl,
        saved_name: &str,
        kind: SavedKind,
        content: &[u8],
    ) -> StorageResult<()>;

    /// Gets a resource by run and saved name
    fn get_resource(&self, run_id: i64, saved_name: &str) -> StorageResult<Option<ResourceRecord>>;

    /// Counts resources of a run by kind
    fn count_resources_by_kind(&self, run_id: i64) -> StorageResult<BTreeMap<SavedKind, u64>>;

    /// Total stored bytes for a run
    fn total_bytes(&self, run_id: i64) -> StorageResult<u64>;

    // ===== Index =====

    /// Replaces the saved-page index of a run
    fn save_index(&mut self, run_id: i64, entries: &[IndexEntry]) -> StorageResult<()>;

    /// Loads the saved-page index of a run in order
    fn load_index(&self, run_id: i64) -> StorageResult<Vec<(String, String)>>;

    // ===== Failures and External Links =====

    /// Stores the per-URL failures of a run
    fn record_failures(&mut self, run_id: i64, failures: &[FailureRecord]) -> StorageResult<()>;

    /// Stores the external references of a run
    fn record_external_links(&mut self, run_id: i64, links: &[CanonicalUrl]) -> StorageResult<()>;

    /// Counts failures of a run by kind
    fn failure_summary(&self, run_id: i64) -> StorageResult<BTreeMap<FailureKind, u64>>;

    /// Counts external references of a run by host, most referenced first
    fn external_hosts(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>>;
}
