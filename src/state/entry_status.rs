/// Archive entry state definitions
///
/// This module defines all possible states of an archived document.
use std::fmt;

/// Represents the current state of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    // ===== Active States =====
    /// Content was fetched but has not been verified and written yet
    Pending,

    // ===== Terminal Success States =====
    /// Content matched its expected digests and is in the content store
    Stored,

    // ===== Terminal Error States =====
    /// Content did not match an expected digest; nothing was written
    DigestMismatch,

    /// Content is stored but the owning plugin could not parse it
    ParseFailed,
}

impl EntryStatus {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the content of this entry is present in the content store
    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Stored | Self::ParseFailed)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::DigestMismatch | Self::ParseFailed)
    }

    /// Converts the entry status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Stored => "stored",
            Self::DigestMismatch => "digest_mismatch",
            Self::ParseFailed => "parse_failed",
        }
    }

    /// Parses an entry status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "stored" => Some(Self::Stored),
            "digest_mismatch" => Some(Self::DigestMismatch),
            "parse_failed" => Some(Self::ParseFailed),
            _ => None,
        }
    }

    /// Returns all possible entry statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Stored,
            Self::DigestMismatch,
            Self::ParseFailed,
        ]
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
