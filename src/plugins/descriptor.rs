use super::{document_text, signed_portion, DirPortClient};
use crate::document::{parse_directory_timestamp, DigestAlgorithm, DigestValue, DocType, DocumentIdentifier};
use crate::plugin::{FetchError, ParseError, Plugin};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Owns relay server descriptors, fetched by digest
///
/// A server descriptor references the extra-info descriptor its relay
/// published alongside it.
pub struct ServerDescriptorPlugin {
    client: Arc<DirPortClient>,
}

impl ServerDescriptorPlugin {
    pub fn new(client: Arc<DirPortClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Plugin for ServerDescriptorPlugin {
    fn doctype(&self) -> DocType {
        DocType::ServerDescriptor
    }

    fn expectations(&self) -> Vec<DocumentIdentifier> {
        Vec::new()
    }

    async fn fetch(&self, id: &DocumentIdentifier) -> Result<Bytes, FetchError> {
        let path = format!("/tor/server/d/{}", id.subject().to_ascii_uppercase());
        self.client.get(&path).await
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<DocumentIdentifier>, ParseError> {
        let text = document_text(raw)?;
        if keyword_line(text, "router").is_none() {
            return Err(ParseError::new("not a server descriptor"));
        }

        let digest_line = match keyword_line(text, "extra-info-digest") {
            Some(line) => line,
            None => return Ok(Vec::new()),
        };
        let published = published(text)?;

        let hex_digest = digest_line
            .split_whitespace()
            .next()
            .ok_or_else(|| ParseError::new("empty extra-info-digest line"))?;
        if hex_digest.len() != DigestAlgorithm::Sha1.hex_len()
            || !hex_digest.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ParseError::new(format!("bad extra-info digest: {}", hex_digest)));
        }

        Ok(vec![DocumentIdentifier::new(
            DocType::ExtraInfo,
            hex_digest.to_ascii_lowercase(),
            published,
        )
        .with_digest(DigestAlgorithm::Sha1, DigestValue::hex(hex_digest))])
    }

    fn digest_input<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        signed_portion(raw, b"router ")
    }
}

/// Owns relay extra-info descriptors, fetched by digest
///
/// Extra-info descriptors reference nothing further.
pub struct ExtraInfoPlugin {
    client: Arc<DirPortClient>,
}

impl ExtraInfoPlugin {
    pub fn new(client: Arc<DirPortClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Plugin for ExtraInfoPlugin {
    fn doctype(&self) -> DocType {
        DocType::ExtraInfo
    }

    fn expectations(&self) -> Vec<DocumentIdentifier> {
        Vec::new()
    }

    async fn fetch(&self, id: &DocumentIdentifier) -> Result<Bytes, FetchError> {
        let path = format!("/tor/extra/d/{}", id.subject().to_ascii_uppercase());
        self.client.get(&path).await
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<DocumentIdentifier>, ParseError> {
        let text = document_text(raw)?;
        if keyword_line(text, "extra-info").is_none() {
            return Err(ParseError::new("not an extra-info descriptor"));
        }
        Ok(Vec::new())
    }

    fn digest_input<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        signed_portion(raw, b"extra-info ")
    }
}

/// Arguments of the first line starting with `keyword`
fn keyword_line<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix(keyword)?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix(' ')
        }
    })
}

fn published(text: &str) -> Result<DateTime<Utc>, ParseError> {
    let line = keyword_line(text, "published")
        .ok_or_else(|| ParseError::new("missing published line"))?;
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(date), Some(time)) => parse_directory_timestamp(date, time)
            .ok_or_else(|| ParseError::new(format!("bad published time: {}", line))),
        _ => Err(ParseError::new(format!("bad published line: {}", line))),
    }
}
