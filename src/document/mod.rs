//! Document identity
//!
//! This module defines how the crawler names the documents it expects to exist:
//! - `DocType`: the kind of Tor directory document
//! - `DocumentIdentifier`: doctype, subject and timestamp, plus expected digests
//! - `DigestAlgorithm` / `DigestValue`: the digests used for integrity checks

mod digest;
mod doctype;
mod identifier;

pub use digest::{DigestAlgorithm, DigestEncoding, DigestError, DigestValue};
pub use doctype::DocType;
pub use identifier::DocumentIdentifier;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp format used by Tor directory documents (`valid-after`, `published`, ...)
pub const DIRECTORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a directory document timestamp split across two whitespace separated
/// arguments (date and time)
///
/// Returns None if either part is missing or malformed.
pub fn parse_directory_timestamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let joined = format!("{} {}", date, time);
    NaiveDateTime::parse_from_str(&joined, DIRECTORY_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
