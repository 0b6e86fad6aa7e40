//! State module for tracking archive entries and crawl progress
//!
//! # Components
//!
//! - `EntryStatus`: Tracks the state of an archived document (pending, stored, mismatched, ...)
//! - `CrawlPhase`: Tracks the lifecycle of a crawl run (idle, seeding, running, draining, done)

mod crawl_phase;
mod entry_status;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use entry_status::EntryStatus;
