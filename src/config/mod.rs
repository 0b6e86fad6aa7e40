//! Configuration module for Bushel
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use bushel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("bushel.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.max_concurrent_fetches);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ArchiveConfig, Config, CrawlerConfig, DirectoryConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
