//! Content-addressed archive
//!
//! The archive verifies fetched documents against the digests their
//! referencing documents promised, writes verified content to a path derived
//! from its SHA-256 digest, and records every outcome in the index.
//!
//! Writes are idempotent: storing the same content for the same document twice
//! returns the existing entry without touching the disk.

mod layout;

pub use layout::content_path;

use crate::document::{DigestAlgorithm, DocumentIdentifier};
use crate::state::EntryStatus;
use crate::storage::{EntryRecord, NewEntry, RunStatus, SqliteStorage, Storage, StorageError};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Algorithm used to address content in the store
pub const CONTENT_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Sha256;

/// Errors raised by the archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index error: {0}")]
    Storage(#[from] StorageError),

    #[error("Archive index lock poisoned")]
    LockPoisoned,
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// A document the archive has seen
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub identifier: DocumentIdentifier,
    /// Index row backing this entry
    pub entry_id: i64,
    /// Lowercase hex SHA-256 of the received content
    pub content_digest: String,
    /// Where the content lives; `None` when nothing was written
    pub storage_path: Option<PathBuf>,
    pub status: EntryStatus,
}

impl ArchiveEntry {
    fn from_record(identifier: &DocumentIdentifier, record: EntryRecord) -> Self {
        Self {
            identifier: identifier.clone(),
            entry_id: record.id,
            content_digest: record.content_digest,
            storage_path: record.storage_path.map(PathBuf::from),
            status: record.status,
        }
    }
}

/// Content-addressed store plus its index
pub struct Archive {
    root: PathBuf,
    index: Mutex<SqliteStorage>,
    /// Current run id, 0 when no run is active
    run_id: AtomicI64,
}

impl Archive {
    /// Opens an archive rooted at `root` with its index at `index_path`
    ///
    /// Both are created if missing.
    pub fn open(root: &Path, index_path: &Path) -> ArchiveResult<Self> {
        std::fs::create_dir_all(root)?;
        let index = SqliteStorage::new(index_path)?;
        Ok(Self::with_index(root, index))
    }

    /// Creates an archive over an existing index
    pub fn with_index(root: &Path, index: SqliteStorage) -> Self {
        Self {
            root: root.to_path_buf(),
            index: Mutex::new(index),
            run_id: AtomicI64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index(&self) -> ArchiveResult<MutexGuard<'_, SqliteStorage>> {
        self.index.lock().map_err(|_| ArchiveError::LockPoisoned)
    }

    fn current_run(&self) -> Option<i64> {
        match self.run_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    /// Records the start of a crawl run; entries stored afterwards are tagged with it
    pub fn begin_run(&self, config_hash: &str) -> ArchiveResult<i64> {
        let run_id = self.index()?.create_run(config_hash)?;
        self.run_id.store(run_id, Ordering::SeqCst);
        Ok(run_id)
    }

    /// Records the end of the current run
    pub fn finish_run(&self, status: RunStatus) -> ArchiveResult<()> {
        let run_id = self.run_id.swap(0, Ordering::SeqCst);
        if run_id != 0 {
            self.index()?.finish_run(run_id, status)?;
        }
        Ok(())
    }

    /// Path the content with the given digest is (or would be) stored at
    pub fn path_for(&self, algorithm: DigestAlgorithm, hex_digest: &str) -> PathBuf {
        content_path(&self.root, algorithm, hex_digest)
    }

    /// Returns true if content with this digest is in the store
    pub fn contains_digest(&self, algorithm: DigestAlgorithm, hex_digest: &str) -> bool {
        self.path_for(algorithm, hex_digest).is_file()
    }

    /// Stores a document, verifying its digests over the whole content
    pub fn store(&self, identifier: &DocumentIdentifier, raw: &[u8]) -> ArchiveResult<ArchiveEntry> {
        self.store_verified(identifier, raw, raw)
    }

    /// Stores a document, verifying its digests over `digested`
    ///
    /// `digested` is the part of `raw` the expected digests were computed
    /// over (for Tor descriptors, everything up to the signature). A document
    /// that fails any expected digest is recorded as `DigestMismatch` and its
    /// content is not written.
    pub fn store_verified(
        &self,
        identifier: &DocumentIdentifier,
        raw: &[u8],
        digested: &[u8],
    ) -> ArchiveResult<ArchiveEntry> {
        let content_digest = CONTENT_ALGORITHM.compute_hex(raw);

        if let Some(algorithm) = first_mismatch(identifier, digested) {
            tracing::warn!(
                "Digest mismatch ({}) for {}, not archiving",
                algorithm,
                identifier
            );
            let (record, _) = self.index()?.insert_entry(&NewEntry {
                doctype: identifier.doctype().clone(),
                subject: identifier.subject().to_string(),
                datetime: identifier.datetime(),
                content_digest,
                storage_path: None,
                status: EntryStatus::DigestMismatch,
                run_id: self.current_run(),
            })?;
            return Ok(ArchiveEntry::from_record(identifier, record));
        }

        let path = self.path_for(CONTENT_ALGORITHM, &content_digest);
        let written = layout::write_if_absent(&path, raw)?;

        let (record, inserted) = self.index()?.insert_entry(&NewEntry {
            doctype: identifier.doctype().clone(),
            subject: identifier.subject().to_string(),
            datetime: identifier.datetime(),
            content_digest,
            storage_path: Some(path.to_string_lossy().into_owned()),
            status: EntryStatus::Stored,
            run_id: self.current_run(),
        })?;

        if inserted {
            tracing::debug!(
                "Archived {} at {} ({})",
                identifier,
                path.display(),
                if written { "new content" } else { "content already present" }
            );
        } else {
            tracing::debug!("{} already archived, keeping existing entry", identifier);
        }

        Ok(ArchiveEntry::from_record(identifier, record))
    }

    /// Marks a stored entry as unparseable; its content stays in the store
    pub fn mark_parse_failed(&self, entry: &ArchiveEntry) -> ArchiveResult<ArchiveEntry> {
        self.index()?
            .update_entry_status(entry.entry_id, EntryStatus::ParseFailed)?;
        Ok(ArchiveEntry {
            status: EntryStatus::ParseFailed,
            ..entry.clone()
        })
    }

    /// Looks up the most recent entry recorded for a document
    pub fn entry(&self, identifier: &DocumentIdentifier) -> ArchiveResult<Option<ArchiveEntry>> {
        let record = self.index()?.get_entry(
            identifier.doctype(),
            identifier.subject(),
            identifier.datetime(),
        )?;
        Ok(record.map(|r| ArchiveEntry::from_record(identifier, r)))
    }

    /// Loads a previously archived document
    ///
    /// Returns None unless the document was stored successfully and its
    /// content file is still present.
    pub fn load(&self, identifier: &DocumentIdentifier) -> ArchiveResult<Option<(ArchiveEntry, Bytes)>> {
        let entry = match self.entry(identifier)? {
            Some(entry) if entry.status == EntryStatus::Stored => entry,
            _ => return Ok(None),
        };

        let path = match &entry.storage_path {
            Some(path) => path.clone(),
            None => return Ok(None),
        };

        match std::fs::read(&path) {
            Ok(content) => Ok(Some((entry, Bytes::from(content)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Index entry for {} points at missing file {}", identifier, path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Returns the first algorithm whose expected digest does not match
///
/// A malformed expected digest counts as a mismatch.
fn first_mismatch(identifier: &DocumentIdentifier, digested: &[u8]) -> Option<DigestAlgorithm> {
    identifier
        .digests()
        .iter()
        .find(|(algorithm, expected)| match expected.matches(**algorithm, digested) {
            Ok(matches) => !matches,
            Err(e) => {
                tracing::warn!("Unusable {} digest for {}: {}", algorithm, identifier, e);
                true
            }
        })
        .map(|(algorithm, _)| *algorithm)
}
