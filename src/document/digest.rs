use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Errors raised when a digest value cannot be normalised
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("Invalid hex digest: {0}")]
    InvalidHex(String),

    #[error("Invalid base64 digest: {0}")]
    InvalidBase64(String),
}

/// Hash algorithms used for document digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    /// SHA-1, used by relay and extra-info descriptor references
    Sha1,
    /// SHA-256, used for content addressing and microdescriptors
    Sha256,
}

impl DigestAlgorithm {
    /// Short lowercase name, also used in archive paths (`by-sha256`)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Parses an algorithm from its short name
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Some(Self::Sha1),
            "sha256" | "sha-256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Length of a hex-encoded digest for this algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Computes the lowercase hex digest of `data`
    pub fn compute_hex(&self, data: &[u8]) -> String {
        match self {
            Self::Sha1 => hex::encode(Sha1::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a digest string is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestEncoding {
    Hex,
    /// Base64, with or without trailing padding (Tor documents omit it)
    Base64,
}

/// An expected digest as it appeared in a referencing document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigestValue {
    value: String,
    encoding: DigestEncoding,
}

impl DigestValue {
    pub fn new(value: impl Into<String>, encoding: DigestEncoding) -> Self {
        Self {
            value: value.into(),
            encoding,
        }
    }

    pub fn hex(value: impl Into<String>) -> Self {
        Self::new(value, DigestEncoding::Hex)
    }

    pub fn base64(value: impl Into<String>) -> Self {
        Self::new(value, DigestEncoding::Base64)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn encoding(&self) -> DigestEncoding {
        self.encoding
    }

    /// Normalises the digest to lowercase hex so digests from different
    /// encodings compare equal
    pub fn to_hex(&self) -> Result<String, DigestError> {
        match self.encoding {
            DigestEncoding::Hex => {
                if self.value.is_empty() || !self.value.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(DigestError::InvalidHex(self.value.clone()));
                }
                Ok(self.value.to_ascii_lowercase())
            }
            DigestEncoding::Base64 => STANDARD_NO_PAD
                .decode(self.value.trim_end_matches('='))
                .map(hex::encode)
                .map_err(|e| DigestError::InvalidBase64(format!("{}: {}", self.value, e))),
        }
    }

    /// Checks whether `data` hashes to this digest under `algorithm`
    pub fn matches(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Result<bool, DigestError> {
        Ok(self.to_hex()? == algorithm.compute_hex(data))
    }
}
