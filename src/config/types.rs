use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Bushel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of fetch workers running concurrently
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// Number of retries after a transient fetch failure
    #[serde(rename = "max-retry-attempts", default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Delay before the first retry (milliseconds), doubled on every attempt
    #[serde(rename = "retry-backoff-base", default = "default_retry_backoff_base")]
    pub retry_backoff_base: u64,

    /// Upper bound for the retry delay (milliseconds)
    #[serde(rename = "retry-backoff-cap", default = "default_retry_backoff_cap")]
    pub retry_backoff_cap: u64,

    /// Stop dispatching new fetches after this many seconds
    #[serde(rename = "run-deadline", default)]
    pub run_deadline: Option<u64>,

    /// How long in-flight fetches may keep running once draining starts (seconds)
    #[serde(rename = "drain-cutoff", default = "default_drain_cutoff")]
    pub drain_cutoff: u64,
}

impl CrawlerConfig {
    /// Delay to wait before retry number `attempt` (zero-based)
    ///
    /// Grows as `base * 2^attempt` and never exceeds the configured cap.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .retry_backoff_base
            .saturating_mul(factor)
            .min(self.retry_backoff_cap);
        Duration::from_millis(millis)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline.map(Duration::from_secs)
    }

    pub fn drain_cutoff(&self) -> Duration {
        Duration::from_secs(self.drain_cutoff)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_backoff_base: default_retry_backoff_base(),
            retry_backoff_cap: default_retry_backoff_cap(),
            run_deadline: None,
            drain_cutoff: default_drain_cutoff(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Archive location configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Root directory of the content-addressed store
    pub path: String,

    /// Path to the SQLite index, defaults to `<path>/index.db`
    #[serde(rename = "index-path", default)]
    pub index_path: Option<String>,
}

impl ArchiveConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    pub fn index_path(&self) -> PathBuf {
        match &self.index_path {
            Some(path) => PathBuf::from(path),
            None => self.root().join("index.db"),
        }
    }
}

/// Directory servers the built-in plugins download from
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// `host:port` DirPort endpoints
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// `host:port` DirPorts of the authorities whose votes are archived
    #[serde(default = "default_endpoints")]
    pub authorities: Vec<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_directory_timeout")]
    pub timeout: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            authorities: default_endpoints(),
            timeout: default_directory_timeout(),
        }
    }
}

fn default_max_concurrent_fetches() -> u32 {
    8
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_base() -> u64 {
    500
}

fn default_retry_backoff_cap() -> u64 {
    30_000
}

fn default_drain_cutoff() -> u64 {
    30
}

fn default_directory_timeout() -> u64 {
    30
}

fn default_endpoints() -> Vec<String> {
    crate::plugins::DIRECTORY_AUTHORITIES
        .iter()
        .map(|endpoint| endpoint.to_string())
        .collect()
}
