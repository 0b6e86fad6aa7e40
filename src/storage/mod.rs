//! Storage module for the archive index
//!
//! This module handles all database operations for the archive, including:
//! - SQLite database initialization and schema management
//! - Archive entry bookkeeping (which documents are stored where)
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::document::DocType;
use crate::state::EntryStatus;
use chrono::{DateTime, SecondsFormat, Utc};

use std::path::Path;

/// Opens (or creates) the archive index at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Formats a document datetime the way it is stored in the index
///
/// A fixed format keeps the uniqueness constraint on `(doctype, subject,
/// datetime, content_digest)` meaningful.
pub fn format_datetime(datetime: DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// An entry about to be recorded in the index
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub doctype: DocType,
    pub subject: String,
    pub datetime: DateTime<Utc>,
    pub content_digest: String,
    pub storage_path: Option<String>,
    pub status: EntryStatus,
    pub run_id: Option<i64>,
}

/// Represents an archive entry in the database
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub id: i64,
    pub doctype: DocType,
    pub subject: String,
    pub datetime: DateTime<Utc>,
    pub content_digest: String,
    pub storage_path: Option<String>,
    pub status: EntryStatus,
    pub run_id: Option<i64>,
    pub recorded_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
