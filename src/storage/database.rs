use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info};

use super::history::{
    HistoryRecord, HistoryRecordSummary, StoredResult, RESULT_FORMAT_VERSION,
};
use crate::cdp::ScanResult;

const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unsupported result format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// SQLite-backed scan history.
///
/// One connection behind a mutex: every operation, including the insert and
/// its `last_insert_rowid`, runs while holding the lock.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the history database at the specified path
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        info!("Opened scan history at {:?}", db_path);
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        // AUTOINCREMENT so ids are never reused after deletion
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                ttfb REAL NOT NULL,
                full_load REAL NOT NULL,
                lcp REAL NOT NULL,
                total_size INTEGER NOT NULL,
                total_requests INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                format_version INTEGER NOT NULL,
                result_json TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Persist a scan, logging instead of failing. The scan itself already
    /// succeeded, so a storage problem must not turn it into an error.
    pub fn save(&self, result: &ScanResult) -> Option<i64> {
        match self.try_save(result) {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to save scan of {} to history: {}", result.url, e);
                None
            }
        }
    }

    /// Persist a scan and return its new id
    pub fn try_save(&self, result: &ScanResult) -> Result<i64, StorageError> {
        let result_json = serde_json::to_string(&StoredResult::current(result))?;
        let created_at = chrono::Utc::now().format(CREATED_AT_FORMAT).to_string();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scans (url, ttfb, full_load, lcp, total_size, total_requests,
                                created_at, format_version, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.url,
                result.metrics.ttfb,
                result.metrics.full_load,
                result.vitals.lcp,
                result.total_size as i64,
                result.total_requests as i64,
                created_at,
                RESULT_FORMAT_VERSION,
                result_json,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Saved scan {} for {}", id, result.url);
        Ok(id)
    }

    /// List stored scans, newest first
    pub fn list_summaries(&self, limit: Option<u32>) -> Result<Vec<HistoryRecordSummary>, StorageError> {
        let conn = self.conn()?;
        let limit_clause = limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default();
        let query = format!(
            "SELECT id, url, ttfb, full_load, lcp, total_size, total_requests, created_at
             FROM scans ORDER BY id DESC{}",
            limit_clause
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| {
            let total_size: i64 = row.get(5)?;
            let total_requests: i64 = row.get(6)?;
            Ok(HistoryRecordSummary {
                id: row.get(0)?,
                url: row.get(1)?,
                ttfb: row.get(2)?,
                full_load: row.get(3)?,
                lcp: row.get(4)?,
                total_size: total_size as u64,
                total_requests: total_requests as usize,
                created_at: row.get(7)?,
            })
        })?;

        let summaries: Result<Vec<_>, _> = rows.collect();
        Ok(summaries?)
    }

    /// Get a stored record by id
    pub fn get_record(&self, id: i64) -> Result<Option<HistoryRecord>, StorageError> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT id, created_at, format_version, result_json FROM scans WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((id, created_at, format_version, result_json)) = row else {
            return Ok(None);
        };

        let result = Self::decode_result(format_version, &result_json)?;
        Ok(Some(HistoryRecord {
            id,
            created_at,
            result,
        }))
    }

    /// Get the full scan result stored under `id`
    pub fn get(&self, id: i64) -> Result<Option<ScanResult>, StorageError> {
        Ok(self.get_record(id)?.map(|record| record.result))
    }

    /// Fetch two results for comparison; `None` if either is missing
    pub fn load_pair(
        &self,
        before_id: i64,
        after_id: i64,
    ) -> Result<Option<(ScanResult, ScanResult)>, StorageError> {
        let before = self.get(before_id)?;
        let after = self.get(after_id)?;
        Ok(before.zip(after))
    }

    /// Delete one record; unknown ids are ignored
    pub fn delete(&self, id: i64) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM scans WHERE id = ?1", params![id])?;
        debug!("Deleted {} history row(s) for id {}", rows, id);
        Ok(())
    }

    /// Delete every record
    pub fn clear(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM scans", [])?;
        info!("Cleared {} history row(s)", rows);
        Ok(())
    }

    fn decode_result(format_version: u32, result_json: &str) -> Result<ScanResult, StorageError> {
        if format_version != RESULT_FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                found: format_version,
                expected: RESULT_FORMAT_VERSION,
            });
        }

        let stored: StoredResult<ScanResult> = serde_json::from_str(result_json)?;
        if stored.format_version != RESULT_FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                found: stored.format_version,
                expected: RESULT_FORMAT_VERSION,
            });
        }
        Ok(stored.result)
    }
}
