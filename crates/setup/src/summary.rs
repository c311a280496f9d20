//! The description of a transport returned to management clients.

use serde::{Deserialize, Serialize};
use tpsetup_engine::{Label, LogEntry, ManagedTransport, TransportId, TransportType};
use tpsetup_overlay::PeerId;

/// Read-only description of one transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSummary {
    /// Transport id.
    pub id: TransportId,

    /// Identity of the node that owns the transport.
    pub local_pk: PeerId,

    /// Identity of the other edge.
    pub remote_pk: PeerId,

    /// Network medium.
    #[serde(rename = "type")]
    pub transport_type: TransportType,

    /// Traffic counters, when the engine keeps them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,

    /// Whether the routing subsystem trusts the remote edge for setup.
    pub is_setup: bool,

    /// Who created the transport.
    pub label: Label,
}

impl TransportSummary {
    /// Summarize `transport`; `is_setup` is the routing-trust verdict for its remote edge.
    #[must_use]
    pub fn new(transport: ManagedTransport, is_setup: bool) -> Self {
        Self {
            id: transport.id,
            local_pk: transport.local,
            remote_pk: transport.remote,
            transport_type: transport.transport_type,
            log: transport.log,
            is_setup,
            label: transport.label,
        }
    }
}
