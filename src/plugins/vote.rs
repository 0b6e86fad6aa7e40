use super::consensus::{check_valid_after, router_statuses, valid_after_at};
use super::{document_text, DirPortClient};
use crate::document::{DocType, DocumentIdentifier};
use crate::plugin::{FetchError, ParseError, Plugin};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

const VOTE_PATH: &str = "/tor/status-vote/current/authority";

/// Owns the network-status votes of the directory authorities
///
/// Votes are identified by the DirPort of the authority that cast them and
/// are always fetched from that authority. Like the consensus, each `r` line
/// references a server descriptor.
pub struct VotePlugin {
    client: Arc<DirPortClient>,
    authorities: Vec<String>,
}

impl VotePlugin {
    pub fn new(client: Arc<DirPortClient>, authorities: Vec<String>) -> Self {
        Self { client, authorities }
    }
}

#[async_trait]
impl Plugin for VotePlugin {
    fn doctype(&self) -> DocType {
        DocType::Vote
    }

    fn expectations(&self) -> Vec<DocumentIdentifier> {
        let valid_after = valid_after_at(Utc::now());
        self.authorities
            .iter()
            .map(|authority| DocumentIdentifier::new(DocType::Vote, authority.as_str(), valid_after))
            .collect()
    }

    async fn fetch(&self, id: &DocumentIdentifier) -> Result<Bytes, FetchError> {
        let raw = self.client.get_from(id.subject(), VOTE_PATH).await?;
        check_valid_after(&raw, id.datetime())?;
        Ok(raw)
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<DocumentIdentifier>, ParseError> {
        let text = document_text(raw)?;
        if !text.starts_with("network-status-version ") {
            return Err(ParseError::new("not a network-status document"));
        }
        if !text.lines().any(|line| line == "vote-status vote") {
            return Err(ParseError::new("network status is not a vote"));
        }
        Ok(router_statuses(text))
    }
}
