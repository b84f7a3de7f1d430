//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Tidewalk database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    status_detail TEXT
);

-- Every saved page and asset, with its content
CREATE TABLE IF NOT EXISTS resources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    saved_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    size INTEGER NOT NULL,
    content BLOB NOT NULL,
    saved_at TEXT NOT NULL,
    UNIQUE(run_id, saved_name)
);

CREATE INDEX IF NOT EXISTS idx_resources_run ON resources(run_id);
CREATE INDEX IF NOT EXISTS idx_resources_url ON resources(url);

-- The ordered saved-page index of a run
CREATE TABLE IF NOT EXISTS index_entries (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    saved_name TEXT NOT NULL,
    PRIMARY KEY (run_id, position)
);

-- Per-URL failures
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_run ON failures(run_id);

-- External references seen during a run
CREATE TABLE IF NOT EXISTS external_links (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    host TEXT NOT NULL,
    PRIMARY KEY (run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_external_links_host ON external_links(host);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
