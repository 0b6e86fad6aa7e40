//! Plugin contract for document types
//!
//! Each document type is owned by a plugin that knows which documents of that
//! type should exist, how to fetch one, and which other documents a fetched
//! one references. The crawl engine depends only on this trait.

mod registry;

pub use registry::{PluginRegistry, RegistryError};

use crate::document::{DocType, DocumentIdentifier};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors a plugin may return from [`Plugin::fetch`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch may succeed if retried (timeouts, 5xx, connection resets)
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Retrying will not help (404, malformed request)
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The error message without its classification
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Permanent(msg) => msg,
        }
    }
}

/// A fetched document could not be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Behaviour the crawler needs from a document type
///
/// Plugins are called concurrently from many workers with no ordering
/// guarantees, so implementations must not rely on call order.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The document type this plugin owns
    fn doctype(&self) -> DocType;

    /// Documents this plugin believes should currently exist
    ///
    /// Called once per crawl run when the frontier is seeded.
    fn expectations(&self) -> Vec<DocumentIdentifier>;

    /// Retrieves the raw bytes of a document
    async fn fetch(&self, id: &DocumentIdentifier) -> Result<Bytes, FetchError>;

    /// Extracts the identifiers of documents referenced by `raw`
    fn parse(&self, raw: &[u8]) -> Result<Vec<DocumentIdentifier>, ParseError>;

    /// The part of `raw` that the document's published digest covers
    fn digest_input<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        raw
    }
}
