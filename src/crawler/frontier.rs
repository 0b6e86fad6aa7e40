//! Deduplicating work set shared by all fetch workers
//!
//! The frontier remembers every identifier it has ever accepted, so each
//! document is queued at most once per run no matter how many documents
//! reference it or how many workers offer it at the same time.

use crate::document::DocumentIdentifier;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct FrontierState {
    seen: HashSet<DocumentIdentifier>,
    pending: VecDeque<DocumentIdentifier>,
    in_flight: HashSet<DocumentIdentifier>,
    closed: bool,
}

impl FrontierState {
    fn enqueue(&mut self, id: DocumentIdentifier) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        self.seen.insert(id.clone());
        self.pending.push_back(id);
        true
    }
}

/// Pending and in-flight identifiers of a crawl run
#[derive(Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // Every critical section leaves the state consistent, so a panic in
        // another holder does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues the initial identifiers, returning how many were new
    pub fn seed(&self, ids: impl IntoIterator<Item = DocumentIdentifier>) -> usize {
        self.offer(ids).len()
    }

    /// Enqueues every identifier not seen before and returns those
    ///
    /// Check and insert happen under one lock, so concurrent offers of the
    /// same identifier enqueue it exactly once.
    pub fn offer(&self, ids: impl IntoIterator<Item = DocumentIdentifier>) -> Vec<DocumentIdentifier> {
        let queued: Vec<DocumentIdentifier> = {
            let mut state = self.lock();
            ids.into_iter()
                .filter(|id| state.enqueue(id.clone()))
                .collect()
        };

        if !queued.is_empty() {
            self.changed.notify_waiters();
        }
        queued
    }

    /// Pops the oldest pending identifier and marks it in flight
    ///
    /// Returns `None` when nothing is pending or the frontier is closed; that
    /// alone does not mean the run is over, since in-flight documents may still
    /// add references.
    pub fn take(&self) -> Option<DocumentIdentifier> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        let id = state.pending.pop_front()?;
        state.in_flight.insert(id.clone());
        Some(id)
    }

    /// Tracks `id` as in flight without taking it from the queue
    ///
    /// Workers do not need this since `take` already marks what it returns;
    /// it is for callers that process an identifier outside the queue.
    pub fn mark_in_flight(&self, id: &DocumentIdentifier) {
        self.lock().in_flight.insert(id.clone());
    }

    /// Records that processing of `id` finished and wakes idle workers
    pub fn mark_done(&self, id: &DocumentIdentifier) {
        self.lock().in_flight.remove(id);
        self.changed.notify_waiters();
    }

    /// True when nothing is pending and nothing is in flight
    pub fn is_quiescent(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    /// Stops handing out work; pending identifiers stay for reporting
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Waits until the frontier changes or `timeout` elapses
    pub async fn wait_for_change(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.changed.notified()).await;
    }

    /// Number of distinct identifiers accepted during this run
    pub fn seen_len(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Identifiers still waiting to be fetched
    pub fn pending(&self) -> Vec<DocumentIdentifier> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Identifiers currently being processed
    pub fn in_flight(&self) -> Vec<DocumentIdentifier> {
        self.lock().in_flight.iter().cloned().collect()
    }
}
