//! Bushel: a reference-driven archiver for Tor directory documents
//!
//! This crate discovers Tor directory documents (consensuses, server descriptors,
//! extra-info descriptors and friends) by following the references each fetched
//! document makes, verifies their digests, and stores every unique document once
//! in a content-addressed archive.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod document;
pub mod monitoring;
pub mod output;
pub mod plugin;
pub mod plugins;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Bushel operations
#[derive(Debug, Error)]
pub enum BushelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl made no progress before it was stopped ({reason})")]
    NoProgress { reason: String },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are the only errors (besides [`BushelError::NoProgress`]) that abort a
/// crawl run; they are raised before any document is seeded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No plugins registered, nothing to crawl")]
    NoPlugins,
}

/// Result type alias for Bushel operations
pub type Result<T> = std::result::Result<T, BushelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use archive::{Archive, ArchiveEntry};
pub use config::Config;
pub use crawler::{CrawlSummary, Orchestrator};
pub use document::{DigestAlgorithm, DigestEncoding, DigestValue, DocType, DocumentIdentifier};
pub use plugin::{FetchError, ParseError, Plugin, PluginRegistry};
pub use state::{CrawlPhase, EntryStatus};
