//! Method names and argument types of the gateway service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tpsetup_engine::TransportType;
use tpsetup_overlay::PeerId;

/// Service prefix every gateway method is addressed under.
pub const SERVICE_NAME: &str = "TransportGateway";

/// Create or reuse a setup-owned transport.
pub const ADD_TRANSPORT: &str = "AddTransport";
/// Delete a setup-owned transport.
pub const REMOVE_TRANSPORT: &str = "RemoveTransport";
/// List setup-owned transports.
pub const GET_TRANSPORTS: &str = "GetTransports";
/// Ask for a handshake nonce.
pub const CHALLENGE: &str = "Challenge";
/// Answer the handshake nonce.
pub const RESPONSE: &str = "Response";

/// Arguments of `AddTransport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTransportRequest {
    /// Remote edge of the transport.
    pub remote_pk: PeerId,
    /// Network medium.
    pub transport_type: TransportType,
    /// Caller's timeout. Only its being non-zero matters to the gateway.
    pub timeout: Duration,
}
