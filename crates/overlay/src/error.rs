//! Error types for overlay operations

use std::io;
use thiserror::Error;

use crate::Addr;

/// Overlay-level errors
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The listener or client was deliberately closed
    #[error("overlay entity closed")]
    Closed,

    /// Port already has a listener
    #[error("port {0} is already bound")]
    PortInUse(u16),

    /// Nobody listens at the dialed address
    #[error("no listener at {0}")]
    Unreachable(Addr),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl OverlayError {
    /// Whether this error only reports that something was closed on purpose.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
