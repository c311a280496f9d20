use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tpsetup_overlay::PeerId;
use uuid::Uuid;

/// Unique identifier of a transport.
///
/// Derived from the sorted edge keys and the transport type, so both ends of
/// a link compute the same id independently.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportId(Uuid);

impl TransportId {
    /// Derive the id of the `transport_type` link between `a` and `b`.
    #[must_use]
    pub fn derive(a: &PeerId, b: &PeerId, transport_type: &TransportType) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let mut name = Vec::with_capacity(64 + transport_type.as_str().len());
        name.extend_from_slice(low.as_bytes());
        name.extend_from_slice(high.as_bytes());
        name.extend_from_slice(transport_type.as_str().as_bytes());

        Self(Uuid::new_v5(&Uuid::nil(), &name))
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TransportId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Network medium a transport runs over.
///
/// Any string is accepted here; whether the engine can actually dial it is
/// decided by the engine.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportType(String);

impl TransportType {
    /// Relayed through the dmsg servers.
    pub const DMSG: &'static str = "dmsg";
    /// Direct TCP to a known address.
    pub const STCP: &'static str = "stcp";
    /// TCP via the address resolver.
    pub const STCPR: &'static str = "stcpr";
    /// UDP hole punching.
    pub const SUDPH: &'static str = "sudph";

    /// Create a transport type.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The type name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the types every engine knows about.
    #[must_use]
    pub fn is_well_known(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::DMSG | Self::STCP | Self::STCPR | Self::SUDPH
        )
    }
}

impl From<&str> for TransportType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TransportType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin of a transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Created by the node's operator.
    User,
    /// Created automatically towards publicly advertised nodes.
    Automatic,
    /// Created by the transport setup subsystem.
    Skycoin,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Automatic => "automatic",
            Self::Skycoin => "skycoin",
        })
    }
}

/// Label owned by the transport setup subsystem.
pub const SETUP_LABEL: Label = Label::Skycoin;

/// Traffic counters of a transport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Total received bytes.
    #[serde(rename = "recv")]
    pub recv_bytes: u64,

    /// Total sent bytes.
    #[serde(rename = "sent")]
    pub sent_bytes: u64,
}

/// A transport as tracked by the engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagedTransport {
    /// Transport id.
    pub id: TransportId,

    /// Local edge.
    pub local: PeerId,

    /// Remote edge.
    pub remote: PeerId,

    /// Network medium.
    pub transport_type: TransportType,

    /// Who created the transport.
    pub label: Label,

    /// Traffic counters, if the engine keeps them for this transport.
    pub log: Option<LogEntry>,
}

impl ManagedTransport {
    /// Describe a new transport from `local` to `remote`.
    #[must_use]
    pub fn new(local: PeerId, remote: PeerId, transport_type: TransportType, label: Label) -> Self {
        Self {
            id: TransportId::derive(&local, &remote, &transport_type),
            local,
            remote,
            transport_type,
            label,
            log: None,
        }
    }
}
