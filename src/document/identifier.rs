use crate::document::{DigestAlgorithm, DigestValue, DocType};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a document the crawler expects to exist
///
/// Two identifiers name the same document when their doctype, subject and
/// datetime match. Expected digests are carried along for integrity checks
/// but take no part in equality or hashing, so the same document referenced
/// with and without a digest deduplicates to one fetch.
#[derive(Debug, Clone)]
pub struct DocumentIdentifier {
    doctype: DocType,
    subject: String,
    datetime: DateTime<Utc>,
    digests: BTreeMap<DigestAlgorithm, DigestValue>,
}

impl DocumentIdentifier {
    /// Creates an identifier with no expected digests
    pub fn new(doctype: DocType, subject: impl Into<String>, datetime: DateTime<Utc>) -> Self {
        Self {
            doctype,
            subject: subject.into(),
            datetime,
            digests: BTreeMap::new(),
        }
    }

    /// Attaches an expected digest, replacing any previous one for `algorithm`
    pub fn with_digest(mut self, algorithm: DigestAlgorithm, digest: DigestValue) -> Self {
        self.digests.insert(algorithm, digest);
        self
    }

    pub fn doctype(&self) -> &DocType {
        &self.doctype
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    pub fn digests(&self) -> &BTreeMap<DigestAlgorithm, DigestValue> {
        &self.digests
    }

    pub fn digest(&self, algorithm: DigestAlgorithm) -> Option<&DigestValue> {
        self.digests.get(&algorithm)
    }
}

impl PartialEq for DocumentIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.doctype == other.doctype
            && self.subject == other.subject
            && self.datetime == other.datetime
    }
}

impl Eq for DocumentIdentifier {}

impl Hash for DocumentIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.doctype.hash(state);
        self.subject.hash(state);
        self.datetime.hash(state);
    }
}

impl fmt::Display for DocumentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.doctype,
            self.subject,
            self.datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}
