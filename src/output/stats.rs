//! Statistics generation from the crawl history database
//!
//! This module provides functionality for extracting and displaying
//! per-run statistics from the storage layer.

use crate::output::{FailureKind, SavedKind};
use crate::storage::{RunRecord, Storage};
use crate::TidewalkError;
use std::collections::BTreeMap;

/// Statistics for one stored run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,

    /// Count of stored resources by kind
    pub resources_by_kind: BTreeMap<SavedKind, u64>,

    /// Total stored content size in bytes
    pub total_bytes: u64,

    /// Number of entries in the saved-page index
    pub indexed_pages: usize,

    /// Failure counts by kind
    pub failures_by_kind: BTreeMap<FailureKind, u64>,

    /// External hosts with reference counts, most referenced first
    pub external_hosts: Vec<(String, u64)>,
}

impl RunStatistics {
    pub fn total_failures(&self) -> u64 {
        self.failures_by_kind.values().sum()
    }

    pub fn resources_of(&self, kind: SavedKind) -> u64 {
        self.resources_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Loads statistics for the most recent run
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(RunStatistics))` - Statistics for the latest run
/// * `Ok(None)` - The database holds no runs
/// * `Err(TidewalkError)` - Failed to query statistics
pub fn load_latest_statistics(storage: &dyn Storage) -> Result<Option<RunStatistics>, TidewalkError> {
    match storage.get_latest_run()? {
        Some(run) => Ok(Some(load_statistics(storage, run)?)),
        None => Ok(None),
    }
}

/// Loads statistics for `run` from storage
pub fn load_statistics(storage: &dyn Storage, run: RunRecord) -> Result<RunStatistics, TidewalkError> {
    let resources_by_kind = storage.count_resources_by_kind(run.id)?;
    let total_bytes = storage.total_bytes(run.id)?;
    let indexed_pages = storage.load_index(run.id)?.len();
    let failures_by_kind = storage.failure_summary(run.id)?;
    let external_hosts = storage.external_hosts(run.id)?;

    Ok(RunStatistics {
        run,
        resources_by_kind,
        total_bytes,
        indexed_pages,
        failures_by_kind,
        external_hosts,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Crawl Statistics (run {}) ===\n", stats.run.id);

    println!("Run:");
    println!("  Seed: {}", stats.run.seed);
    println!("  Started: {}", stats.run.started_at);
    println!(
        "  Finished: {}",
        stats.run.finished_at.as_deref().unwrap_or("(not finished)")
    );
    match &stats.run.status_detail {
        Some(detail) => println!("  Status: {} ({})", stats.run.status.to_db_string(), detail),
        None => println!("  Status: {}", stats.run.status.to_db_string()),
    }
    println!("  Config hash: {}", stats.run.config_hash);
    println!();

    println!("Overview:");
    println!("  Pages saved: {}", stats.resources_of(SavedKind::Page));
    println!("  Assets saved: {}", stats.resources_of(SavedKind::Asset));
    println!(
        "  External pages saved: {}",
        stats.resources_of(SavedKind::ExternalPage)
    );
    println!("  Indexed pages: {}", stats.indexed_pages);
    println!("  Stored bytes: {}", stats.total_bytes);
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failure Summary:");
        let mut counts: Vec<_> = stats.failures_by_kind.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));

        let total = stats.total_failures();
        for (kind, count) in counts {
            let percentage = (*count as f64 / total as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", kind, count, percentage);
        }
        println!();
    }

    if !stats.external_hosts.is_empty() {
        println!("External Hosts ({}):", stats.external_hosts.len());
        for (host, count) in stats.external_hosts.iter().take(20) {
            println!("  - {} ({})", host, count);
        }
        println!();
    }
}
