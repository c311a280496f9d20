//! Listener and client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Overlay port reserved for transport setup traffic.
pub const DEFAULT_PORT: u16 = 47;

/// Deadline for saving a transport, and default call timeout, in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Configuration for the transport listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Overlay port to listen on
    pub port: u16,
    /// Deadline for the engine's save operation, applied when the caller
    /// passes a non-zero timeout; `0` disables it
    pub save_timeout_ms: u64,
}

impl ListenerConfig {
    /// The save deadline, if any.
    #[must_use]
    pub const fn save_timeout(&self) -> Option<Duration> {
        match self.save_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            save_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Configuration for outbound management connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote overlay port to dial
    pub port: u16,
    /// Per-call timeout; `0` means calls wait indefinitely
    pub call_timeout_ms: u64,
}

impl ClientConfig {
    /// The call timeout, if any.
    #[must_use]
    pub const fn call_timeout(&self) -> Option<Duration> {
        match self.call_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            call_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}
