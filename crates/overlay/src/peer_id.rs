//! Peer identity type

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors from parsing or converting a [`PeerId`].
#[derive(Debug, Error, PartialEq)]
pub enum PeerIdError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The input had the wrong number of bytes.
    #[error("expected 32 bytes, got {0}")]
    Length(usize),

    /// The bytes are not a valid ed25519 point.
    #[error("not a valid ed25519 public key")]
    InvalidKey,
}

/// Public-key identity of an overlay peer.
///
/// Wraps the raw bytes of an ed25519 verifying key so it can be used as a
/// cheap `Copy` map key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; PUBLIC_KEY_LENGTH]);

impl PeerId {
    /// Create from raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// The ed25519 key behind this identity, for signature checks.
    ///
    /// # Errors
    ///
    /// Returns [`PeerIdError::InvalidKey`] if the bytes are not a curve point.
    pub fn verifying_key(&self) -> Result<VerifyingKey, PeerIdError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| PeerIdError::InvalidKey)
    }

    /// Deterministic identity derived from a one-byte seed.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn from_seed(seed: u8) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[seed; 32]);
        Self::from(signing_key.verifying_key())
    }
}

impl From<VerifyingKey> for PeerId {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let len = bytes.len();
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|_| PeerIdError::Length(len))?;
        Ok(Self(bytes))
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_display_parses_back() {
        let pk = PeerId::from_seed(7);
        let parsed: PeerId = pk.to_string().parse().unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!("abcd".parse::<PeerId>(), Err(PeerIdError::Length(2)));
        assert!(matches!("zz".parse::<PeerId>(), Err(PeerIdError::Hex(_))));
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let pk = PeerId::from_seed(1);
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{pk}\""));
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn test_seeded_ids_are_distinct_and_valid() {
        let a = PeerId::from_seed(1);
        let b = PeerId::from_seed(2);
        assert_ne!(a, b);
        assert!(a.verifying_key().is_ok());
    }
}
