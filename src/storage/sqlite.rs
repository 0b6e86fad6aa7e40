//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::document::DocType;
use crate::state::EntryStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{format_datetime, EntryRecord, NewEntry, RunRecord, RunStatus, StorageError};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const ENTRY_COLUMNS: &str = "id, doctype, subject, datetime, content_digest, storage_path, status, run_id, recorded_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; missing parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

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
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_datetime(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<EntryRecord> {
    let datetime: String = row.get(3)?;
    Ok(EntryRecord {
        id: row.get(0)?,
        doctype: DocType::from_db_string(&row.get::<_, String>(1)?),
        subject: row.get(2)?,
        datetime: parse_datetime(3, &datetime)?,
        content_digest: row.get(4)?,
        storage_path: row.get(5)?,
        status: EntryStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(EntryStatus::Pending),
        run_id: row.get(7)?,
        recorded_at: row.get(8)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Entry Management =====

    fn insert_entry(&mut self, entry: &NewEntry) -> StorageResult<(EntryRecord, bool)> {
        let datetime = format_datetime(entry.datetime);
        let now = Utc::now().to_rfc3339();

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO entries
             (doctype, subject, datetime, content_digest, storage_path, status, run_id, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.doctype.as_str(),
                entry.subject,
                datetime,
                entry.content_digest,
                entry.storage_path,
                entry.status.to_db_string(),
                entry.run_id,
                now
            ],
        )? > 0;

        let record = self.conn.query_row(
            &format!(
                "SELECT {} FROM entries
                 WHERE doctype = ?1 AND subject = ?2 AND datetime = ?3 AND content_digest = ?4",
                ENTRY_COLUMNS
            ),
            params![
                entry.doctype.as_str(),
                entry.subject,
                datetime,
                entry.content_digest
            ],
            entry_from_row,
        )?;

        Ok((record, inserted))
    }

    fn get_entry(
        &self,
        doctype: &DocType,
        subject: &str,
        datetime: DateTime<Utc>,
    ) -> StorageResult<Option<EntryRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM entries
                     WHERE doctype = ?1 AND subject = ?2 AND datetime = ?3
                     ORDER BY id DESC LIMIT 1",
                    ENTRY_COLUMNS
                ),
                params![doctype.as_str(), subject, format_datetime(datetime)],
                entry_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_digest(&self, content_digest: &str) -> StorageResult<Vec<EntryRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM entries WHERE content_digest = ?1 ORDER BY id",
            ENTRY_COLUMNS
        ))?;

        let rows = stmt.query_map(params![content_digest], entry_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn update_entry_status(&mut self, entry_id: i64, status: EntryStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE entries SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), entry_id],
        )?;
        if updated == 0 {
            return Err(StorageError::EntryNotFound(format!("Entry ID {}", entry_id)));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_entries_by_status(&self, status: EntryStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_entries(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unique_contents(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT content_digest) FROM entries WHERE storage_path IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_entries_by_doctype(&self) -> StorageResult<HashMap<DocType, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doctype, COUNT(*) FROM entries GROUP BY doctype")?;

        let rows = stmt.query_map([], |row| {
            let doctype: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((DocType::from_db_string(&doctype), count as u64))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (doctype, count) = row?;
            counts.insert(doctype, count);
        }
        Ok(counts)
    }
}
