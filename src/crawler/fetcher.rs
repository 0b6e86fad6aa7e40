//! Fetch worker pool
//!
//! Each worker repeatedly takes an identifier from the frontier and runs it
//! through the pipeline:
//! - resolve the owning plugin
//! - reuse the archived copy if one exists, otherwise fetch with retry
//! - verify and store the content
//! - expand the document's references
//! - mark the identifier done
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | `FetchError::Transient` | Retry up to `max-retry-attempts` times with exponential backoff |
//! | `FetchError::Permanent` | Record failure, no retry |
//! | No plugin for the doctype | Record failure, no retry |
//! | Cancelled during backoff | Abandon the identifier |

use crate::archive::{Archive, ArchiveEntry};
use crate::config::CrawlerConfig;
use crate::crawler::expander::{ExpandOutcome, Expander};
use crate::crawler::frontier::Frontier;
use crate::document::DocumentIdentifier;
use crate::plugin::{FetchError, Plugin, PluginRegistry};
use crate::state::EntryStatus;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How long an idle worker waits before checking the frontier again
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Final outcome of fetching one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    /// Still failing transiently when the fetch was given up
    TransientFailure,
    PermanentFailure,
}

/// Result of fetching one identifier, after retries
#[derive(Debug)]
pub struct FetchResult {
    pub identifier: DocumentIdentifier,
    pub raw_content: Option<Bytes>,
    pub outcome: FetchOutcome,
    /// Number of times the plugin's fetch was called
    pub attempts: u32,
    pub error: Option<FetchError>,
}

/// Why an identifier could not be archived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The plugin reported a permanent error
    Permanent,
    /// Every attempt failed transiently
    RetriesExhausted,
    /// No plugin is registered for the doctype
    UnknownDoctype,
    /// The content could not be written to the archive
    Archive,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Permanent => "permanent",
            Self::RetriesExhausted => "retries exhausted",
            Self::UnknownDoctype => "unknown doctype",
            Self::Archive => "archive",
        })
    }
}

/// A per-identifier failure
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub identifier: DocumentIdentifier,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Counters shared by all workers of a run
#[derive(Debug, Default)]
pub struct RunStats {
    stored: AtomicU64,
    reused: AtomicU64,
    mismatched: AtomicU64,
    parse_failed: AtomicU64,
    fetch_attempts: AtomicU64,
    failures: Mutex<Vec<FailureRecord>>,
    abandoned: Mutex<Vec<DocumentIdentifier>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    /// Documents served from an earlier run's archive instead of the network
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    pub fn mismatched(&self) -> u64 {
        self.mismatched.load(Ordering::Relaxed)
    }

    pub fn parse_failed(&self) -> u64 {
        self.parse_failed.load(Ordering::Relaxed)
    }

    /// Total calls to plugin fetch, retries included
    pub fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).len() as u64
    }

    /// Identifiers that reached a final outcome
    pub fn resolved(&self) -> u64 {
        self.stored() + self.reused() + self.mismatched() + self.parse_failed() + self.failed()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn abandoned(&self) -> Vec<DocumentIdentifier> {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_failure(&self, record: FailureRecord) {
        tracing::warn!(
            "Giving up on {} ({}, {} attempts): {}",
            record.identifier,
            record.kind,
            record.attempts,
            record.message
        );
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    fn record_abandoned(&self, id: DocumentIdentifier) {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }
}

/// Worker pool state shared by every worker
#[derive(Clone)]
pub struct Fetcher {
    registry: Arc<PluginRegistry>,
    frontier: Arc<Frontier>,
    archive: Arc<Archive>,
    expander: Expander,
    stats: Arc<RunStats>,
    config: Arc<CrawlerConfig>,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        registry: Arc<PluginRegistry>,
        frontier: Arc<Frontier>,
        archive: Arc<Archive>,
        stats: Arc<RunStats>,
        config: CrawlerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let expander = Expander::new(registry.clone(), frontier.clone());
        Self {
            registry,
            frontier,
            archive,
            expander,
            stats,
            config: Arc::new(config),
            cancel,
        }
    }

    /// Spawns `max-concurrent-fetches` workers into `tasks`
    pub fn spawn_workers(&self, tasks: &mut JoinSet<()>) {
        let workers = self.config.max_concurrent_fetches.max(1);
        for worker_id in 0..workers {
            let fetcher = self.clone();
            tasks.spawn(async move { fetcher.run_worker(worker_id).await });
        }
        tracing::debug!("Spawned {} fetch workers", workers);
    }

    async fn run_worker(self, worker_id: u32) {
        tracing::trace!("Worker {} started", worker_id);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.frontier.take() {
                Some(id) => {
                    self.process(&id).await;
                    self.frontier.mark_done(&id);
                }
                None => {
                    if self.frontier.is_closed() || self.frontier.is_quiescent() {
                        break;
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = self.frontier.wait_for_change(IDLE_WAIT) => {}
                    }
                }
            }
        }

        tracing::trace!("Worker {} finished", worker_id);
    }

    /// Runs one identifier through the pipeline
    pub async fn process(&self, id: &DocumentIdentifier) {
        let plugin = match self.registry.resolve(id.doctype()) {
            Ok(plugin) => plugin,
            Err(e) => {
                self.stats.record_failure(FailureRecord {
                    identifier: id.clone(),
                    kind: FailureKind::UnknownDoctype,
                    message: e.to_string(),
                    attempts: 0,
                });
                return;
            }
        };

        if self.reuse_archived(id) {
            return;
        }

        let result = match self.fetch_with_retry(plugin.as_ref(), id).await {
            Some(result) => result,
            None => {
                tracing::info!("Abandoning {} after cancellation", id);
                self.stats.record_abandoned(id.clone());
                return;
            }
        };

        let raw = match (result.outcome, result.raw_content) {
            (FetchOutcome::Fetched, Some(raw)) => raw,
            (outcome, _) => {
                let kind = match outcome {
                    FetchOutcome::TransientFailure => FailureKind::RetriesExhausted,
                    _ => FailureKind::Permanent,
                };
                self.stats.record_failure(FailureRecord {
                    identifier: id.clone(),
                    kind,
                    message: result
                        .error
                        .map(|e| e.message().to_string())
                        .unwrap_or_default(),
                    attempts: result.attempts,
                });
                return;
            }
        };

        let entry = match self
            .archive
            .store_verified(id, &raw, plugin.digest_input(&raw))
        {
            Ok(entry) => entry,
            Err(e) => {
                self.stats.record_failure(FailureRecord {
                    identifier: id.clone(),
                    kind: FailureKind::Archive,
                    message: e.to_string(),
                    attempts: result.attempts,
                });
                return;
            }
        };

        if entry.status == EntryStatus::DigestMismatch {
            self.stats.mismatched.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.expand(id, &entry, &raw) {
            self.stats.stored.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Expands an already archived document instead of fetching it again
    fn reuse_archived(&self, id: &DocumentIdentifier) -> bool {
        match self.archive.load(id) {
            Ok(Some((entry, raw))) => {
                tracing::debug!("Reusing archived copy of {}", id);
                if self.expand(id, &entry, &raw) {
                    self.stats.reused.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Could not look up {} in the archive: {}", id, e);
                false
            }
        }
    }

    /// Expands a stored document, returning false if it failed to parse
    fn expand(&self, id: &DocumentIdentifier, entry: &ArchiveEntry, raw: &[u8]) -> bool {
        match self.expander.expand(id, raw) {
            Ok(ExpandOutcome::Expanded { .. }) => true,
            Ok(ExpandOutcome::ParseFailed(_)) => {
                if let Err(e) = self.archive.mark_parse_failed(entry) {
                    tracing::error!("Failed to mark {} as unparseable: {}", id, e);
                }
                self.stats.parse_failed.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) => {
                // The plugin was resolved moments ago, so this only happens if
                // the registry changed underneath us.
                tracing::error!("Cannot expand {}: {}", id, e);
                self.stats.parse_failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Fetches `id`, retrying transient failures with exponential backoff
    ///
    /// Returns `None` if the run was cancelled while waiting to retry.
    pub async fn fetch_with_retry(
        &self,
        plugin: &dyn Plugin,
        id: &DocumentIdentifier,
    ) -> Option<FetchResult> {
        let max_attempts = self.config.max_retry_attempts + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.stats.fetch_attempts.fetch_add(1, Ordering::Relaxed);

            let error = match plugin.fetch(id).await {
                Ok(raw) => {
                    tracing::debug!("Fetched {} ({} bytes, attempt {})", id, raw.len(), attempt);
                    return Some(FetchResult {
                        identifier: id.clone(),
                        raw_content: Some(raw),
                        outcome: FetchOutcome::Fetched,
                        attempts: attempt,
                        error: None,
                    });
                }
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= max_attempts {
                let outcome = if error.is_transient() {
                    FetchOutcome::TransientFailure
                } else {
                    FetchOutcome::PermanentFailure
                };
                return Some(FetchResult {
                    identifier: id.clone(),
                    raw_content: None,
                    outcome,
                    attempts: attempt,
                    error: Some(error),
                });
            }

            let delay = self.config.backoff_for(attempt - 1);
            tracing::debug!(
                "Fetch of {} failed ({}), retrying in {:?} (attempt {}/{})",
                id,
                error,
                delay,
                attempt,
                max_attempts
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
