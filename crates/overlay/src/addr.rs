use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PeerId;

/// An overlay address: a peer identity plus a port on that peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Addr {
    /// Identity of the peer.
    pub pk: PeerId,
    /// Overlay port on the peer.
    pub port: u16,
}

impl Addr {
    /// Create a new address.
    #[must_use]
    pub const fn new(pk: PeerId, port: u16) -> Self {
        Self { pk, port }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pk, self.port)
    }
}
