//! The set of peers allowed to use the control plane.

use serde::{Deserialize, Serialize};
use tpsetup_overlay::PeerId;

/// Peers authorized to open control connections.
///
/// Fixed for the lifetime of a listener. Lists are expected to hold tens of
/// entries, so membership is a linear scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustList(Vec<PeerId>);

impl TrustList {
    /// Create a trust list from `peers`, keeping their order.
    pub fn new(peers: impl IntoIterator<Item = PeerId>) -> Self {
        Self(peers.into_iter().collect())
    }

    /// Whether `pk` may open control connections.
    #[must_use]
    pub fn contains(&self, pk: &PeerId) -> bool {
        self.0.iter().any(|trusted| trusted == pk)
    }

    /// Number of trusted peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no peer is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trusted peers, in load order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.0.iter()
    }
}

impl FromIterator<PeerId> for TrustList {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self::new(iter)
    }
}
