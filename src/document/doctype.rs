use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The kind of a Tor directory document
///
/// The string forms match the `@type` annotations used by CollecTor archives.
/// Plugins for document types not listed here use `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocType {
    /// Network status consensus (`ns` flavour)
    Consensus,
    /// Microdescriptor-flavoured consensus
    MicrodescConsensus,
    /// Directory authority vote
    Vote,
    /// Relay server descriptor
    ServerDescriptor,
    /// Relay extra-info descriptor
    ExtraInfo,
    /// Relay microdescriptor
    Microdescriptor,
    /// Bridge authority network status
    BridgeStatus,
    /// Bridge server descriptor
    BridgeServerDescriptor,
    /// Bridge extra-info descriptor
    BridgeExtraInfo,
    /// Any other document type supplied by a plugin
    Other(String),
}

impl DocType {
    /// Converts the doctype to its stable string representation
    ///
    /// This is used for storing the doctype in the archive index.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Consensus => "network-status-consensus-3",
            Self::MicrodescConsensus => "network-status-microdesc-consensus-3",
            Self::Vote => "network-status-vote-3",
            Self::ServerDescriptor => "server-descriptor",
            Self::ExtraInfo => "extra-info",
            Self::Microdescriptor => "microdescriptor",
            Self::BridgeStatus => "bridge-network-status",
            Self::BridgeServerDescriptor => "bridge-server-descriptor",
            Self::BridgeExtraInfo => "bridge-extra-info",
            Self::Other(name) => name,
        }
    }

    /// Parses a doctype from its string representation
    ///
    /// Unknown names become `Other`, so this never fails.
    pub fn from_db_string(s: &str) -> Self {
        match s {
            "network-status-consensus-3" => Self::Consensus,
            "network-status-microdesc-consensus-3" => Self::MicrodescConsensus,
            "network-status-vote-3" => Self::Vote,
            "server-descriptor" => Self::ServerDescriptor,
            "extra-info" => Self::ExtraInfo,
            "microdescriptor" => Self::Microdescriptor,
            "bridge-network-status" => Self::BridgeStatus,
            "bridge-server-descriptor" => Self::BridgeServerDescriptor,
            "bridge-extra-info" => Self::BridgeExtraInfo,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_db_string(s))
    }
}
