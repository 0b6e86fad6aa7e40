//! Storage traits and error types
//!
//! This module defines the trait interface for archive index backends and
//! associated error types.

use crate::document::DocType;
use crate::state::EntryStatus;
use crate::storage::{EntryRecord, NewEntry, RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for archive index backends
///
/// The index records which documents the archive holds and where their
/// content lives. Implementations are used behind a mutex by the archive, so
/// individual calls need not be thread-safe.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status and a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Entry Management =====

    /// Inserts an entry unless the same document with the same content is
    /// already recorded
    ///
    /// # Returns
    ///
    /// The stored record and whether this call inserted it
    fn insert_entry(&mut self, entry: &NewEntry) -> StorageResult<(EntryRecord, bool)>;

    /// Gets the most recently recorded entry for a document
    fn get_entry(
        &self,
        doctype: &DocType,
        subject: &str,
        datetime: DateTime<Utc>,
    ) -> StorageResult<Option<EntryRecord>>;

    /// Gets all entries whose content hashes to `content_digest`
    fn find_by_digest(&self, content_digest: &str) -> StorageResult<Vec<EntryRecord>>;

    /// Updates the status of an entry
    fn update_entry_status(&mut self, entry_id: i64, status: EntryStatus) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts entries with the given status
    fn count_entries_by_status(&self, status: EntryStatus) -> StorageResult<u64>;

    /// Counts all entries
    fn count_total_entries(&self) -> StorageResult<u64>;

    /// Counts distinct content digests that were written to the content store
    fn count_unique_contents(&self) -> StorageResult<u64>;

    /// Counts entries per doctype
    fn count_entries_by_doctype(&self) -> StorageResult<HashMap<DocType, u64>>;
}
