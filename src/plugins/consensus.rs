use super::{document_text, DirPortClient};
use crate::document::{parse_directory_timestamp, DigestAlgorithm, DigestValue, DocType, DocumentIdentifier};
use crate::plugin::{FetchError, ParseError, Plugin};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use std::sync::Arc;

/// Subject of the network-status consensus document
pub const CONSENSUS_SUBJECT: &str = "ns";

const CONSENSUS_PATH: &str = "/tor/status-vote/current/consensus";

/// The valid-after time of the consensus that should be current at `now`
///
/// Authorities publish a new consensus at the top of every hour.
pub fn valid_after_at(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(0))
        .unwrap_or(now)
}

/// Owns the relay network-status consensus
///
/// Each router status entry (`r` line) references the server descriptor the
/// relay published, by its SHA-1 digest.
pub struct ConsensusPlugin {
    client: Arc<DirPortClient>,
}

impl ConsensusPlugin {
    pub fn new(client: Arc<DirPortClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Plugin for ConsensusPlugin {
    fn doctype(&self) -> DocType {
        DocType::Consensus
    }

    fn expectations(&self) -> Vec<DocumentIdentifier> {
        vec![DocumentIdentifier::new(
            DocType::Consensus,
            CONSENSUS_SUBJECT,
            valid_after_at(Utc::now()),
        )]
    }

    async fn fetch(&self, id: &DocumentIdentifier) -> Result<Bytes, FetchError> {
        let raw = self.client.get(CONSENSUS_PATH).await?;
        check_valid_after(&raw, id.datetime())?;
        Ok(raw)
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<DocumentIdentifier>, ParseError> {
        let text = document_text(raw)?;
        if !text.starts_with("network-status-version ") {
            return Err(ParseError::new("not a network-status document"));
        }
        Ok(router_statuses(text))
    }
}

/// The `valid-after` time of a network-status document
pub(super) fn valid_after(text: &str) -> Option<DateTime<Utc>> {
    let line = text.lines().find_map(|line| line.strip_prefix("valid-after "))?;
    let mut fields = line.split_whitespace();
    parse_directory_timestamp(fields.next()?, fields.next()?)
}

/// Rejects a network-status document from another period than `expected`
///
/// Directory ports may lag behind, so a stale document is a transient
/// failure; a later attempt or another endpoint can serve the right one.
pub(super) fn check_valid_after(raw: &[u8], expected: DateTime<Utc>) -> Result<(), FetchError> {
    let found = std::str::from_utf8(raw).ok().and_then(valid_after);
    match found {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(FetchError::transient(format!(
            "valid-after is {}, expected {}",
            found.to_rfc3339_opts(SecondsFormat::Secs, true),
            expected.to_rfc3339_opts(SecondsFormat::Secs, true)
        ))),
        None => Err(FetchError::transient("no valid-after line in network status")),
    }
}

/// Server descriptor references of every well-formed `r` line
///
/// Malformed entries are logged and skipped so one bad line does not hide
/// the rest of the document.
pub(super) fn router_statuses(text: &str) -> Vec<DocumentIdentifier> {
    text.lines()
        .filter(|line| line.starts_with("r "))
        .filter_map(|line| match parse_router_status(line) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Skipping router status: {}", e);
                None
            }
        })
        .collect()
}

/// `r` SP nickname SP identity SP digest SP publication-date SP publication-time ...
fn parse_router_status(line: &str) -> Result<DocumentIdentifier, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(ParseError::new(format!("truncated router status: {}", line)));
    }

    let digest = DigestValue::base64(fields[3]);
    let subject = digest
        .to_hex()
        .map_err(|e| ParseError::new(format!("bad descriptor digest in {}: {}", line, e)))?;
    if subject.len() != DigestAlgorithm::Sha1.hex_len() {
        return Err(ParseError::new(format!("descriptor digest is not SHA-1: {}", line)));
    }

    let published = parse_directory_timestamp(fields[4], fields[5])
        .ok_or_else(|| ParseError::new(format!("bad publication time: {}", line)))?;

    Ok(DocumentIdentifier::new(DocType::ServerDescriptor, subject, published)
        .with_digest(DigestAlgorithm::Sha1, digest))
}
