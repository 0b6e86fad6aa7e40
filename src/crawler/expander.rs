//! Turns fetched documents into new frontier entries

use crate::crawler::frontier::Frontier;
use crate::document::DocumentIdentifier;
use crate::plugin::{ParseError, PluginRegistry, RegistryError};
use std::sync::Arc;

/// Result of expanding one document
#[derive(Debug)]
pub enum ExpandOutcome {
    /// The document parsed; its references were offered to the frontier
    Expanded {
        discovered: Vec<DocumentIdentifier>,
        /// How many of `discovered` had not been seen before
        newly_queued: usize,
    },
    /// The document could not be parsed and contributes no references
    ParseFailed(ParseError),
}

impl ExpandOutcome {
    /// Identifiers the document referenced (empty for a parse failure)
    pub fn identifiers(&self) -> &[DocumentIdentifier] {
        match self {
            Self::Expanded { discovered, .. } => discovered,
            Self::ParseFailed(_) => &[],
        }
    }

    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ParseFailed(_))
    }
}

/// Parses documents with their owning plugin and feeds the frontier
#[derive(Clone)]
pub struct Expander {
    registry: Arc<PluginRegistry>,
    frontier: Arc<Frontier>,
}

impl Expander {
    pub fn new(registry: Arc<PluginRegistry>, frontier: Arc<Frontier>) -> Self {
        Self { registry, frontier }
    }

    pub fn expand(
        &self,
        id: &DocumentIdentifier,
        raw: &[u8],
    ) -> Result<ExpandOutcome, RegistryError> {
        let plugin = self.registry.resolve(id.doctype())?;

        match plugin.parse(raw) {
            Ok(discovered) => {
                let newly_queued = self.frontier.offer(discovered.iter().cloned()).len();
                tracing::debug!(
                    "{} references {} documents, {} new",
                    id,
                    discovered.len(),
                    newly_queued
                );
                Ok(ExpandOutcome::Expanded {
                    discovered,
                    newly_queued,
                })
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", id, e);
                Ok(ExpandOutcome::ParseFailed(e))
            }
        }
    }
}
