//! Error types for the transport setup control plane.

use std::time::Duration;

use thiserror::Error;
use tpsetup_engine::TransportId;
use tpsetup_overlay::{OverlayError, PeerId};
use tpsetup_rpc::ErrorInfo;

/// Error codes used when an [`Error`] crosses the RPC boundary.
pub mod codes {
    /// The transport engine failed.
    pub const ENGINE: &str = "ENGINE";
    /// The transport was not created by the setup subsystem.
    pub const INCORRECT_TYPE: &str = "INCORRECT_TYPE";
    /// No transport with the requested id.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Saving the transport exceeded the gateway's deadline.
    pub const SAVE_DEADLINE: &str = "SAVE_DEADLINE";
    /// The challenge/response handshake failed.
    pub const HANDSHAKE: &str = "HANDSHAKE";
    /// The call arguments could not be decoded.
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Result type for transport setup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the gateway, the listener and the clients.
#[derive(Debug, Error)]
pub enum Error {
    /// A live connection to the peer already exists.
    #[error("already connected to {0}")]
    AlreadyConnected(PeerId),

    /// No connection to the peer exists.
    #[error("not connected to {0}")]
    NotConnected(PeerId),

    /// The transport exists but was not created by transport setup.
    #[error("transport {0} was not created by transport setup")]
    IncorrectType(TransportId),

    /// No transport with this id.
    #[error("transport {0} not found")]
    TransportNotFound(TransportId),

    /// Error reported by the transport engine.
    #[error("transport engine error: {0}")]
    Engine(String),

    /// Saving a transport did not finish in time.
    #[error("saving transport exceeded {0:?}")]
    SaveDeadline(Duration),

    /// A call to the remote gateway timed out; the connection is closed.
    #[error("call timed out after {0:?}")]
    CallTimeout(Duration),

    /// Challenge/response handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The remote gateway rejected our answer to its challenge.
    #[error("failed to solve the challenge sent by {pk}: {source}")]
    ChallengeFailed {
        /// Peer whose challenge was not solved.
        pk: PeerId,
        /// Why the challenge or the response failed.
        source: Box<Error>,
    },

    /// Call arguments or reply could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The control port could not be bound.
    #[error("failed to listen on port {port}: {source}")]
    Bind {
        /// Port that was requested.
        port: u16,
        /// Underlying overlay error.
        source: OverlayError,
    },

    /// Accepting an inbound stream failed.
    #[error("accept failed: {0}")]
    Accept(OverlayError),

    /// Dialing or another overlay operation failed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// RPC transport failure.
    #[error(transparent)]
    Rpc(tpsetup_rpc::Error),

    /// Remote error with a code this side does not know.
    #[error("remote error: {0}")]
    Remote(ErrorInfo),
}

impl Error {
    pub(crate) fn engine(error: &impl std::error::Error) -> Self {
        Self::Engine(error.to_string())
    }

    /// Rebuild an error received from the remote gateway.
    ///
    /// `message` carries the variant's argument; unknown codes or malformed
    /// arguments are kept as [`Error::Remote`].
    #[must_use]
    pub fn from_error_info(info: ErrorInfo) -> Self {
        let rebuilt = match info.code.as_str() {
            codes::ENGINE => Some(Self::Engine(info.message.clone())),
            codes::HANDSHAKE => Some(Self::Handshake(info.message.clone())),
            codes::BAD_REQUEST => Some(Self::BadRequest(info.message.clone())),
            codes::INCORRECT_TYPE => info.message.parse().ok().map(Self::IncorrectType),
            codes::NOT_FOUND => info.message.parse().ok().map(Self::TransportNotFound),
            codes::SAVE_DEADLINE => info
                .message
                .parse()
                .ok()
                .map(|ms| Self::SaveDeadline(Duration::from_millis(ms))),
            _ => None,
        };

        rebuilt.unwrap_or(Self::Remote(info))
    }
}

impl From<&Error> for ErrorInfo {
    fn from(error: &Error) -> Self {
        match error {
            Error::Engine(message) => Self::new(codes::ENGINE, message.clone()),
            Error::IncorrectType(id) => Self::new(codes::INCORRECT_TYPE, id.to_string()),
            Error::TransportNotFound(id) => Self::new(codes::NOT_FOUND, id.to_string()),
            Error::SaveDeadline(deadline) => {
                Self::new(codes::SAVE_DEADLINE, deadline.as_millis().to_string())
            }
            Error::Handshake(message) => Self::new(codes::HANDSHAKE, message.clone()),
            Error::BadRequest(message) => Self::new(codes::BAD_REQUEST, message.clone()),
            Error::Remote(info) => info.clone(),
            other => Self::new(codes::ENGINE, other.to_string()),
        }
    }
}

impl From<Error> for ErrorInfo {
    fn from(error: Error) -> Self {
        Self::from(&error)
    }
}

impl From<tpsetup_rpc::Error> for Error {
    fn from(error: tpsetup_rpc::Error) -> Self {
        match error {
            tpsetup_rpc::Error::Timeout(timeout) => Self::CallTimeout(timeout),
            tpsetup_rpc::Error::Remote(info) => Self::from_error_info(info),
            other => Self::Rpc(other),
        }
    }
}
