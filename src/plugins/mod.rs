//! Built-in plugins that download from Tor directory ports
//!
//! These plugins read only the keyword lines needed to follow references:
//! consensus and vote `r` lines, and the `extra-info-digest` and `published`
//! lines of server descriptors.

mod consensus;
mod descriptor;
mod dirport;
mod vote;

pub use consensus::{valid_after_at, ConsensusPlugin, CONSENSUS_SUBJECT};
pub use descriptor::{ExtraInfoPlugin, ServerDescriptorPlugin};
pub use dirport::{build_http_client, classify_status, DirPortClient};
pub use vote::VotePlugin;

use crate::config::Config;
use crate::plugin::{ParseError, PluginRegistry};
use crate::BushelError;
use std::sync::Arc;

/// DirPorts of the directory authorities
pub const DIRECTORY_AUTHORITIES: &[&str] = &[
    "128.31.0.39:9131",    // moria1
    "194.109.206.212:80",  // dizum
    "131.188.40.189:80",   // gabelmoo
    "193.23.244.244:80",   // dannenberg
    "171.25.193.9:443",    // maatuska
    "154.35.175.225:80",   // Faravahar
    "199.58.81.140:80",    // longclaw
    "204.13.164.11:80",    // bastet
];

/// Builds a registry with the consensus, vote, server descriptor and
/// extra-info plugins
pub fn default_registry(config: &Config) -> Result<PluginRegistry, BushelError> {
    let client = Arc::new(DirPortClient::new(&config.user_agent, &config.directory)?);

    let mut registry = PluginRegistry::new();
    registry.register_plugin(Arc::new(ConsensusPlugin::new(client.clone())));
    registry.register_plugin(Arc::new(VotePlugin::new(
        client.clone(),
        config.directory.authorities.clone(),
    )));
    registry.register_plugin(Arc::new(ServerDescriptorPlugin::new(client.clone())));
    registry.register_plugin(Arc::new(ExtraInfoPlugin::new(client)));
    Ok(registry)
}

fn document_text(raw: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(raw).map_err(|e| ParseError::new(format!("document is not UTF-8: {}", e)))
}

/// The portion of a descriptor covered by its digest
///
/// Runs from the line starting with `first_keyword` through the
/// `router-signature` line. Falls back to the whole document if either end
/// is missing.
fn signed_portion<'a>(raw: &'a [u8], first_keyword: &[u8]) -> &'a [u8] {
    const END: &[u8] = b"\nrouter-signature\n";

    let start = if raw.starts_with(first_keyword) {
        Some(0)
    } else {
        find(raw, &[&b"\n"[..], first_keyword].concat()).map(|pos| pos + 1)
    };

    match start {
        Some(start) => match find(&raw[start..], END) {
            Some(end) => &raw[start..start + end + END.len()],
            None => raw,
        },
        None => raw,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
