//! Sink that persists crawl output into the SQLite history database

use crate::output::{IndexEntry, SavedKind, SavedNames, Sink, SinkError};
use crate::storage::{SqliteStorage, Storage, StorageError};
use crate::url::CanonicalUrl;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Stores every saved resource and the final index under one run ID
pub struct SqliteSink {
    storage: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
    names: SavedNames,
}

impl SqliteSink {
    /// Creates a sink writing into `run_id`; the run must already exist
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, run_id: i64) -> Self {
        Self {
            storage,
            run_id,
            names: SavedNames::new(),
        }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn with_storage<T>(
        &self,
        op: impl FnOnce(&mut SqliteStorage) -> Result<T, StorageError>,
    ) -> Result<T, SinkError> {
        let mut storage = self.storage.lock().unwrap_or_else(|p| p.into_inner());
        op(&mut storage).map_err(|e| SinkError::Storage(e.to_string()))
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn save(
        &self,
        url: &CanonicalUrl,
        content: &[u8],
        kind: SavedKind,
    ) -> Result<String, SinkError> {
        let name = self.names.reserve(url, kind);
        self.with_storage(|s| s.insert_resource(self.run_id, url, &name, kind, content))?;

        tracing::debug!(url = %url, saved = %name, bytes = content.len(), "Stored resource");
        Ok(name)
    }

    async fn flush_index(&self, entries: &[IndexEntry]) -> Result<(), SinkError> {
        self.with_storage(|s| s.save_index(self.run_id, entries))?;

        tracing::info!(run_id = self.run_id, pages = entries.len(), "Stored index");
        Ok(())
    }
}
