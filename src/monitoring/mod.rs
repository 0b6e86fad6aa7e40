//! Freshness checks for a published archive mirror
//!
//! Checks report in the Nagios plugin convention: a single output line
//! `"<STATUS>: <message>"` and the status as the process exit code.

mod collector;

pub use collector::{
    check_index_created, check_latest_recent, run_check, run_checks, Category, Check, CollectorIndex,
    CollectorRemote, IndexDirectory, IndexFile, TimestampFormat, CATEGORIES,
};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Nagios check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckStatus {
    pub fn exit_code(&self) -> i32 {
        *self as i32
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Critical, message)
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

/// Returns the key and value of the oldest timestamp
pub fn oldest_timestamp(
    timestamps: &BTreeMap<String, DateTime<Utc>>,
) -> Option<(&str, DateTime<Utc>)> {
    timestamps
        .iter()
        .min_by_key(|(_, timestamp)| **timestamp)
        .map(|(key, timestamp)| (key.as_str(), *timestamp))
}

/// Grades the age of the oldest timestamp against warning and critical limits
///
/// Ages strictly greater than a limit trip it.
pub fn timestamp_too_old(
    timestamps: &BTreeMap<String, DateTime<Utc>>,
    warning_secs: i64,
    critical_secs: i64,
    now: DateTime<Utc>,
) -> CheckResult {
    let (key, oldest) = match oldest_timestamp(timestamps) {
        Some(oldest) => oldest,
        None => return CheckResult::new(CheckStatus::Unknown, "No timestamps to check"),
    };

    let age = (now - oldest).num_seconds();
    let stamp = format!("{}={}", key, oldest.format("%Y-%m-%dT%H:%M:%S"));

    if age > critical_secs {
        CheckResult::new(
            CheckStatus::Critical,
            format!("Timestamp is too old ({} sec): {}", age, stamp),
        )
    } else if age > warning_secs {
        CheckResult::new(
            CheckStatus::Warning,
            format!("Timestamp is not recent ({} sec): {}", age, stamp),
        )
    } else {
        CheckResult::new(
            CheckStatus::Ok,
            format!("Valid response with recent timestamp ({} sec): {}", age, stamp),
        )
    }
}
