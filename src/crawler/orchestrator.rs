//! Crawl orchestration
//!
//! The orchestrator owns one crawl run from start to finish:
//! - checks that there is something to crawl
//! - seeds a fresh frontier from every plugin's expectations
//! - runs the worker pool until the frontier is quiescent, the deadline
//!   passes, or the run is cancelled
//! - drains in-flight work and reports what was left behind
//! - records the run in the archive index

use crate::archive::Archive;
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FailureRecord, Fetcher, RunStats};
use crate::crawler::frontier::Frontier;
use crate::document::DocumentIdentifier;
use crate::plugin::PluginRegistry;
use crate::state::CrawlPhase;
use crate::storage::RunStatus;
use crate::{BushelError, ConfigError};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The frontier reached quiescence
    Completed,
    /// A deadline or cancellation stopped the run early
    Interrupted,
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        })
    }
}

/// What a crawl run did
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Distinct identifiers accepted by the frontier
    pub discovered: u64,
    /// Documents fetched, verified, stored and expanded
    pub stored: u64,
    /// Documents expanded from an earlier run's archive
    pub reused: u64,
    pub failed: u64,
    pub mismatched: u64,
    pub parse_failed: u64,
    /// Identifiers whose processing was cut off while draining
    pub abandoned: Vec<DocumentIdentifier>,
    /// Identifiers still pending when the run stopped
    pub unprocessed: Vec<DocumentIdentifier>,
    pub failures: Vec<FailureRecord>,
    /// Calls to plugin fetch, retries included
    pub fetch_attempts: u64,
    pub elapsed: Duration,
    pub outcome: CrawlOutcome,
}

impl CrawlSummary {
    pub fn is_complete(&self) -> bool {
        self.outcome == CrawlOutcome::Completed
    }
}

/// Drives one crawl run
pub struct Orchestrator {
    registry: Arc<PluginRegistry>,
    archive: Arc<Archive>,
    config: CrawlerConfig,
    config_hash: String,
    deadline: Option<Duration>,
    drain_cutoff: Duration,
    cancel: CancellationToken,
    phase: CrawlPhase,
}

impl Orchestrator {
    /// Creates an orchestrator; deadline and drain cutoff come from `config`
    pub fn new(registry: PluginRegistry, archive: Arc<Archive>, config: CrawlerConfig) -> Self {
        let deadline = config.run_deadline();
        let drain_cutoff = config.drain_cutoff();
        Self {
            registry: Arc::new(registry),
            archive,
            config,
            config_hash: String::new(),
            deadline,
            drain_cutoff,
            cancel: CancellationToken::new(),
            phase: CrawlPhase::Idle,
        }
    }

    /// Hash of the configuration, recorded with the run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_drain_cutoff(mut self, drain_cutoff: Duration) -> Self {
        self.drain_cutoff = drain_cutoff;
        self
    }

    /// Stops the run when `cancel` is cancelled
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Unexpected crawl phase change {} -> {}", self.phase, next);
        }
        tracing::info!("Crawl phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Runs the crawl to quiescence, deadline or cancellation
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The run finished, completely or not
    /// * `Err(BushelError::Config)` - No plugins are registered
    /// * `Err(BushelError::NoProgress)` - The run was stopped before any
    ///   document reached a final outcome
    pub async fn run(mut self) -> Result<CrawlSummary, BushelError> {
        if self.registry.is_empty() {
            return Err(ConfigError::NoPlugins.into());
        }

        let start_time = Instant::now();
        let run_id = self.archive.begin_run(&self.config_hash)?;
        tracing::info!(
            "Starting crawl run {} with {} plugins",
            run_id,
            self.registry.len()
        );

        // Seeding
        self.transition(CrawlPhase::Seeding);
        let frontier = Arc::new(Frontier::new());
        for (doctype, plugin) in self.registry.plugins() {
            let seeded = frontier.seed(plugin.expectations());
            tracing::info!("Seeded {} expected {} documents", seeded, doctype);
        }

        // Running
        self.transition(CrawlPhase::Running);
        let stats = Arc::new(RunStats::new());
        let workers_cancel = self.cancel.child_token();
        let fetcher = Fetcher::new(
            self.registry.clone(),
            frontier.clone(),
            self.archive.clone(),
            stats.clone(),
            self.config.clone(),
            workers_cancel.clone(),
        );

        let mut tasks = JoinSet::new();
        fetcher.spawn_workers(&mut tasks);

        let deadline = self.deadline;
        let interrupted = tokio::select! {
            _ = join_all(&mut tasks) => false,
            _ = sleep_until_deadline(deadline) => {
                tracing::warn!("Run deadline reached");
                true
            }
            _ = self.cancel.cancelled() => {
                tracing::warn!("Crawl cancelled");
                true
            }
        };
        let interrupted = interrupted || self.cancel.is_cancelled();

        // Draining
        if interrupted {
            self.transition(CrawlPhase::Draining);
            frontier.close();
            workers_cancel.cancel();

            let drained = tokio::time::timeout(self.drain_cutoff, join_all(&mut tasks))
                .await
                .is_ok();
            if !drained {
                tracing::warn!(
                    "{} fetches still running after {:?}, aborting them",
                    frontier.in_flight().len(),
                    self.drain_cutoff
                );
                tasks.abort_all();
                join_all(&mut tasks).await;
            }
        }

        let mut abandoned = stats.abandoned();
        abandoned.extend(frontier.in_flight());
        let unprocessed = frontier.pending();

        if interrupted && stats.resolved() == 0 {
            self.archive.finish_run(RunStatus::Failed)?;
            return Err(BushelError::NoProgress {
                reason: format!(
                    "{} abandoned, {} unprocessed",
                    abandoned.len(),
                    unprocessed.len()
                ),
            });
        }

        self.transition(CrawlPhase::Done);
        let outcome = if interrupted {
            CrawlOutcome::Interrupted
        } else {
            CrawlOutcome::Completed
        };
        self.archive.finish_run(match outcome {
            CrawlOutcome::Completed => RunStatus::Completed,
            CrawlOutcome::Interrupted => RunStatus::Interrupted,
        })?;

        let summary = CrawlSummary {
            discovered: frontier.seen_len() as u64,
            stored: stats.stored(),
            reused: stats.reused(),
            failed: stats.failed(),
            mismatched: stats.mismatched(),
            parse_failed: stats.parse_failed(),
            abandoned,
            unprocessed,
            failures: stats.failures(),
            fetch_attempts: stats.fetch_attempts(),
            elapsed: start_time.elapsed(),
            outcome,
        };

        tracing::info!(
            "Crawl run {} {}: {} discovered, {} stored, {} failed in {:.1}s",
            run_id,
            summary.outcome,
            summary.discovered,
            summary.stored,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );

        Ok(summary)
    }
}

/// Waits for every worker, logging any that panicked
async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("Fetch worker panicked: {}", e);
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Duration>) {
    match deadline {
        Some(deadline) => tokio::time::sleep(deadline).await,
        None => std::future::pending().await,
    }
}
