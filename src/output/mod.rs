//! Output module for crawl summaries and archive reports
//!
//! This module handles:
//! - Printing the summary of a finished crawl run
//! - Loading and printing statistics from the archive index

pub mod stats;

pub use stats::{load_statistics, print_statistics, ArchiveStatistics};

use crate::crawler::CrawlSummary;
use std::io::{self, Write};

/// Failures and leftover identifiers listed individually before truncating
const MAX_LISTED: usize = 20;

/// Writes a human-readable crawl summary
pub fn write_summary<W: Write>(out: &mut W, summary: &CrawlSummary) -> io::Result<()> {
    writeln!(out, "=== Crawl Summary ===\n")?;
    writeln!(out, "Outcome: {}", summary.outcome)?;
    writeln!(out, "Elapsed: {:.1}s", summary.elapsed.as_secs_f64())?;
    writeln!(out)?;

    writeln!(out, "Documents:")?;
    writeln!(out, "  Discovered: {}", summary.discovered)?;
    writeln!(out, "  Stored: {}", summary.stored)?;
    writeln!(out, "  Reused from archive: {}", summary.reused)?;
    writeln!(out, "  Failed: {}", summary.failed)?;
    writeln!(out, "  Digest mismatches: {}", summary.mismatched)?;
    writeln!(out, "  Parse failures: {}", summary.parse_failed)?;
    writeln!(out, "  Abandoned: {}", summary.abandoned.len())?;
    writeln!(out, "  Unprocessed: {}", summary.unprocessed.len())?;
    writeln!(out, "  Fetch attempts: {}", summary.fetch_attempts)?;

    if !summary.failures.is_empty() {
        writeln!(out, "\nFailures ({}):", summary.failures.len())?;
        for failure in summary.failures.iter().take(MAX_LISTED) {
            writeln!(
                out,
                "  - {} [{}, {} attempts] {}",
                failure.identifier, failure.kind, failure.attempts, failure.message
            )?;
        }
        if summary.failures.len() > MAX_LISTED {
            writeln!(out, "  ... and {} more", summary.failures.len() - MAX_LISTED)?;
        }
    }

    if !summary.abandoned.is_empty() {
        writeln!(out, "\nAbandoned ({}):", summary.abandoned.len())?;
        for id in summary.abandoned.iter().take(MAX_LISTED) {
            writeln!(out, "  - {}", id)?;
        }
    }

    Ok(())
}

/// Prints the crawl summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    let stdout = io::stdout();
    if let Err(e) = write_summary(&mut stdout.lock(), summary) {
        tracing::error!("Failed to print crawl summary: {}", e);
    }
}
