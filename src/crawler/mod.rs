//! Crawler module for reference-driven document discovery
//!
//! This module contains the crawl engine, including:
//! - The deduplicating frontier of pending documents
//! - The fetch worker pool with retry and backoff
//! - Reference expansion through document plugins
//! - Overall run orchestration

mod expander;
mod fetcher;
mod frontier;
mod orchestrator;

pub use expander::{ExpandOutcome, Expander};
pub use fetcher::{FailureKind, FailureRecord, FetchOutcome, FetchResult, Fetcher, RunStats};
pub use frontier::Frontier;
pub use orchestrator::{CrawlOutcome, CrawlSummary, Orchestrator};

use crate::archive::Archive;
use crate::config::Config;
use crate::plugins::default_registry;
use crate::BushelError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl with the built-in directory plugins
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the archive and its index
/// 2. Build the plugin registry from the directory configuration
/// 3. Crawl until quiescence, deadline, or `cancel` fires
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `cancel` - Cancelling this token stops the crawl gracefully
pub async fn crawl(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<CrawlSummary, BushelError> {
    let archive = Archive::open(&config.archive.root(), &config.archive.index_path())?;
    let registry = default_registry(&config)?;

    let orchestrator = Orchestrator::new(registry, Arc::new(archive), config.crawler.clone())
        .with_config_hash(config_hash)
        .with_cancellation_token(cancel);

    orchestrator.run().await
}
