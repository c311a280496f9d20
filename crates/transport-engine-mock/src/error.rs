//! Error types for the mock transport engine.

use thiserror::Error;
use tpsetup_engine::{EngineError, EngineErrorKind, TransportId, TransportType};

/// Error type for the mock transport engine.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Returned by an injected failure.
    #[error("Mock engine error: {0}")]
    MockError(String),

    /// No transport with the given id.
    #[error("Transport not found: {0}")]
    NotFound(TransportId),

    /// The engine has no client for the transport type.
    #[error("Unknown network type: {0}")]
    UnknownNetwork(TransportType),

    /// The engine was closed.
    #[error("Transport engine closed")]
    Closed,
}

impl EngineError for Error {
    fn kind(&self) -> EngineErrorKind {
        match self {
            Self::NotFound(_) => EngineErrorKind::NotFound,
            Self::UnknownNetwork(_) => EngineErrorKind::UnknownNetwork,
            Self::Closed => EngineErrorKind::Closed,
            Self::MockError(_) => EngineErrorKind::Other,
        }
    }
}
