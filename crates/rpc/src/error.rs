//! Error types for the RPC framework.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::message::ErrorInfo;

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for RPC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol-level errors.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Codec errors during serialization/deserialization.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The call did not complete in time; the connection was closed.
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// The connection is closed and can no longer carry calls.
    #[error("Connection closed")]
    Closed,

    /// The connection went away while a reply was outstanding.
    #[error("Connection lost before reply")]
    ConnectionLost,

    /// The server answered with an error.
    #[error("Remote error: {0}")]
    Remote(ErrorInfo),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame too large.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Size of the frame.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Unknown frame kind byte.
    #[error("Unknown frame kind: {0:#x}")]
    UnknownFrameKind(u8),

    /// Checksum mismatch.
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },
}

/// Codec-related errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("Failed to serialize: {0}")]
    SerializationFailed(String),

    /// Deserialization failed.
    #[error("Failed to deserialize: {0}")]
    DeserializationFailed(String),
}

impl From<ciborium::de::Error<io::Error>> for CodecError {
    fn from(err: ciborium::de::Error<io::Error>) -> Self {
        Self::DeserializationFailed(err.to_string())
    }
}

impl From<ciborium::ser::Error<io::Error>> for CodecError {
    fn from(err: ciborium::ser::Error<io::Error>) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}
