//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::{FailureKind, FailureRecord, IndexEntry, RunOutcome, SavedKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ResourceRecord, RunRecord, RunStatus};
use crate::url::CanonicalUrl;
use crate::TidewalkError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, seed, started_at, finished_at, config_hash, status, status_detail";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(TidewalkError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TidewalkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, TidewalkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        seed: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        status_detail: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, seed: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (seed, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![seed, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        Ok(self.conn.query_row(&sql, [], run_from_row).optional()?)
    }

    fn list_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let detail = match outcome {
            RunOutcome::SeedRejected { reason } => Some(reason.as_str()),
            _ => None,
        };
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, status_detail = ?2, finished_at = ?3 WHERE id = ?4",
            params![RunStatus::from_outcome(outcome).to_db_string(), detail, now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn mark_failed(&mut self, run_id: i64, detail: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, status_detail = ?2, finished_at = ?3 WHERE id = ?4",
            params![RunStatus::Failed.to_db_string(), detail, now, run_id],
        )?;
        Ok(())
    }

    // ===== Resources =====

    fn insert_resource(
        &mut self,
        run_id: i64,
        url: &CanonicalUrl,
        saved_name: &str,
        kind: SavedKind,
        content: &[u8],
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO resources (run_id, url, saved_name, kind, size, content, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                url.as_str(),
                saved_name,
                kind.as_str(),
                content.len() as i64,
                content,
                now
            ],
        )?;
        Ok(())
    }

    fn get_resource(&self, run_id: i64, saved_name: &str) -> StorageResult<Option<ResourceRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT run_id, url, saved_name, kind, size, content, saved_at
                 FROM resources WHERE run_id = ?1 AND saved_name = ?2",
                params![run_id, saved_name],
                |row| {
                    Ok(ResourceRecord {
                        run_id: row.get(0)?,
                        url: row.get(1)?,
                        saved_name: row.get(2)?,
                        kind: SavedKind::from_db_string(&row.get::<_, String>(3)?)
                            .unwrap_or(SavedKind::Page),
                        size: row.get::<_, i64>(4)? as u64,
                        content: row.get(5)?,
                        saved_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn count_resources_by_kind(&self, run_id: i64) -> StorageResult<BTreeMap<SavedKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM resources WHERE run_id = ?1 GROUP BY kind")?;

        let mut counts = BTreeMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = SavedKind::from_db_string(&kind) {
                counts.insert(kind, count as u64);
            }
        }
        Ok(counts)
    }

    fn total_bytes(&self, run_id: i64) -> StorageResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM resources WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    // ===== Index =====

    fn save_index(&mut self, run_id: i64, entries: &[IndexEntry]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM index_entries WHERE run_id = ?1", params![run_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO index_entries (run_id, position, url, saved_name) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, entry) in entries.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    position as i64,
                    entry.url.as_str(),
                    entry.saved_name
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_index(&self, run_id: i64) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT saved_name, url FROM index_entries WHERE run_id = ?1 ORDER BY position",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ===== Failures and External Links =====

    fn record_failures(&mut self, run_id: i64, failures: &[FailureRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO failures (run_id, url, kind, message) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for failure in failures {
                stmt.execute(params![
                    run_id,
                    failure.url.as_str(),
                    failure.kind.as_str(),
                    failure.message
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn record_external_links(&mut self, run_id: i64, links: &[CanonicalUrl]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO external_links (run_id, url, host) VALUES (?1, ?2, ?3)",
            )?;
            for link in links {
                stmt.execute(params![run_id, link.as_str(), link.host()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn failure_summary(&self, run_id: i64) -> StorageResult<BTreeMap<FailureKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM failures WHERE run_id = ?1 GROUP BY kind")?;

        let mut summary = BTreeMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = FailureKind::from_db_string(&kind) {
                summary.insert(kind, count as u64);
            }
        }
        Ok(summary)
    }

    fn external_hosts(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT host, COUNT(*) AS refs FROM external_links WHERE run_id = ?1
             GROUP BY host ORDER BY refs DESC, host ASC",
        )?;
        let hosts = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hosts)
    }
}
