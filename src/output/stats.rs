//! Statistics generation from the archive index
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the storage layer.

use crate::document::DocType;
use crate::state::EntryStatus;
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::HashMap;

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct ArchiveStatistics {
    /// Total number of index entries
    pub total_entries: u64,

    /// Number of distinct contents in the store
    pub unique_contents: u64,

    /// Count of entries by status
    pub entries_by_status: HashMap<EntryStatus, u64>,

    /// Count of entries by document type
    pub entries_by_doctype: HashMap<DocType, u64>,

    /// The most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ArchiveStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<ArchiveStatistics> {
    let mut entries_by_status = HashMap::new();
    for status in EntryStatus::all_statuses() {
        let count = storage.count_entries_by_status(status)?;
        if count > 0 {
            entries_by_status.insert(status, count);
        }
    }

    Ok(ArchiveStatistics {
        total_entries: storage.count_total_entries()?,
        unique_contents: storage.count_unique_contents()?,
        entries_by_status,
        entries_by_doctype: storage.count_entries_by_doctype()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Index entries: {}", stats.total_entries);
    println!("  Unique contents: {}", stats.unique_contents);
    println!();

    println!("Entries by Status:");
    let mut status_counts: Vec<_> = stats.entries_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (status, count) in status_counts {
        let percentage = if stats.total_entries > 0 {
            (*count as f64 / stats.total_entries as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.entries_by_doctype.is_empty() {
        println!("Entries by Document Type:");
        let mut doctype_counts: Vec<_> = stats.entries_by_doctype.iter().collect();
        doctype_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (doctype, count) in doctype_counts {
            println!("  {}: {}", doctype, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => println!(
            "Latest Run: #{} {} (started {}, finished {})",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        ),
        None => println!("Latest Run: none"),
    }
}
