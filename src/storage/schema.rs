//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the archive index.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per (document, content) pair the archive has seen
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doctype TEXT NOT NULL,
    subject TEXT NOT NULL,
    datetime TEXT NOT NULL,
    content_digest TEXT NOT NULL,
    storage_path TEXT,
    status TEXT NOT NULL,
    run_id INTEGER REFERENCES runs(id),
    recorded_at TEXT NOT NULL,
    UNIQUE(doctype, subject, datetime, content_digest)
);

CREATE INDEX IF NOT EXISTS idx_entries_identity ON entries(doctype, subject, datetime);
CREATE INDEX IF NOT EXISTS idx_entries_digest ON entries(content_digest);
CREATE INDEX IF NOT EXISTS idx_entries_status ON entries(status);
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
