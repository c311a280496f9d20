//! Request and response envelopes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code for calls to a method the server does not expose.
pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";

/// Error code for a reply that does not fit in one frame.
pub const REPLY_TOO_LARGE: &str = "REPLY_TOO_LARGE";

/// One method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number used to correlate the reply.
    pub seq: u64,
    /// Fully qualified method name, `<Service>.<Method>`.
    pub method: String,
    /// CBOR-encoded arguments.
    pub payload: Bytes,
}

/// The single reply to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number of the request being answered.
    pub seq: u64,
    /// CBOR-encoded return value; empty when `error` is set.
    pub payload: Bytes,
    /// Error raised by the handler, if any.
    pub error: Option<ErrorInfo>,
}

/// Error information carried across the RPC boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ErrorInfo {
    /// Error code for categorization.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorInfo {
    /// Create a new error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error for a method that is not served.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(UNKNOWN_METHOD, format!("unknown method {method}"))
    }
}
