//! Shared helpers for integration tests

use async_trait::async_trait;
use bushel::archive::Archive;
use bushel::config::CrawlerConfig;
use bushel::document::{DocType, DocumentIdentifier};
use bushel::plugin::{FetchError, ParseError, Plugin};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn published() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 5, 3, 17, 0, 0).unwrap()
}

/// Identifier of a test document
pub fn id(doctype: &str, subject: &str) -> DocumentIdentifier {
    DocumentIdentifier::new(DocType::from_db_string(doctype), subject, published())
}

/// Opens an archive inside `dir`
pub fn open_archive(dir: &TempDir) -> Arc<Archive> {
    Arc::new(
        Archive::open(&dir.path().join("store"), &dir.path().join("index.db"))
            .expect("Failed to open archive"),
    )
}

/// Crawler settings with short backoff so retry tests run quickly
pub fn fast_config(workers: u32) -> CrawlerConfig {
    CrawlerConfig {
        max_concurrent_fetches: workers,
        max_retry_attempts: 3,
        retry_backoff_base: 1,
        retry_backoff_cap: 5,
        ..CrawlerConfig::default()
    }
}

/// How a document responds to fetches
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Ok,
    /// Fails transiently this many times, then succeeds
    FailTransient(u32),
    AlwaysTransient,
    Permanent,
    /// Never completes
    Hang,
    /// Succeeds with content the plugin cannot parse
    Garbage,
}

struct Node {
    refs: Vec<DocumentIdentifier>,
    behavior: Behavior,
}

/// Serves an in-memory document graph for one doctype
///
/// A document's content is a `doc` line followed by one `ref <doctype>
/// <subject>` line per referenced document.
pub struct GraphPlugin {
    doctype: DocType,
    seeds: Vec<DocumentIdentifier>,
    nodes: HashMap<String, Node>,
    calls: Mutex<HashMap<String, u32>>,
}

impl GraphPlugin {
    pub fn new(doctype: &str) -> Self {
        Self {
            doctype: DocType::from_db_string(doctype),
            seeds: Vec::new(),
            nodes: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(mut self, subject: &str) -> Self {
        self.seeds.push(id(self.doctype.as_str(), subject));
        self
    }

    pub fn seed_id(mut self, identifier: DocumentIdentifier) -> Self {
        self.seeds.push(identifier);
        self
    }

    pub fn node(self, subject: &str, refs: Vec<DocumentIdentifier>) -> Self {
        self.node_with(subject, refs, Behavior::Ok)
    }

    pub fn node_with(mut self, subject: &str, refs: Vec<DocumentIdentifier>, behavior: Behavior) -> Self {
        self.nodes.insert(subject.to_string(), Node { refs, behavior });
        self
    }

    /// Content served for `subject`
    pub fn content(&self, subject: &str) -> String {
        let mut content = format!("doc {} {}\n", self.doctype, subject);
        if let Some(node) = self.nodes.get(subject) {
            for reference in &node.refs {
                content.push_str(&format!("ref {} {}\n", reference.doctype(), reference.subject()));
            }
        }
        content
    }

    pub fn calls(&self, subject: &str) -> u32 {
        self.calls.lock().unwrap().get(subject).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Plugin for GraphPlugin {
    fn doctype(&self) -> DocType {
        self.doctype.clone()
    }

    fn expectations(&self) -> Vec<DocumentIdentifier> {
        self.seeds.clone()
    }

    async fn fetch(&self, identifier: &DocumentIdentifier) -> Result<Bytes, FetchError> {
        let subject = identifier.subject();
        let previous_calls = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(subject.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let node = self
            .nodes
            .get(subject)
            .ok_or_else(|| FetchError::permanent(format!("no document {}", subject)))?;

        match node.behavior {
            Behavior::Ok => Ok(Bytes::from(self.content(subject))),
            Behavior::FailTransient(failures) if previous_calls < failures => {
                Err(FetchError::transient("HTTP 503"))
            }
            Behavior::FailTransient(_) => Ok(Bytes::from(self.content(subject))),
            Behavior::AlwaysTransient => Err(FetchError::transient("HTTP 503")),
            Behavior::Permanent => Err(FetchError::permanent("HTTP 404")),
            Behavior::Hang => std::future::pending().await,
            Behavior::Garbage => Ok(Bytes::from_static(b"\xff\xfe not a document")),
        }
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<DocumentIdentifier>, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|e| ParseError::new(e.to_string()))?;
        let mut lines = text.lines();
        match lines.next() {
            Some(line) if line.starts_with("doc ") => {}
            _ => return Err(ParseError::new("missing doc line")),
        }

        lines
            .map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next(), fields.next()) {
                    (Some("ref"), Some(doctype), Some(subject)) => Ok(id(doctype, subject)),
                    _ => Err(ParseError::new(format!("bad line {:?}", line))),
                }
            })
            .collect()
    }
}
