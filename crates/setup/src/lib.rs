//! Authenticated control plane for setting up transports on a running node.
//!
//! A node runs a [`TransportListener`] on a well-known overlay port. Streams
//! from peers on its [`TrustList`] are served by a per-connection
//! [`Gateway`] that exposes `AddTransport`, `RemoveTransport` and
//! `GetTransports` on top of the node's transport engine. Everyone else is
//! disconnected without a reply.
//!
//! Managing parties use a [`ManagementClient`] to keep one [`SetupClient`]
//! session per node and issue timeout-bounded calls through it.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
mod gateway;
mod listener;
mod manager;
pub mod protocol;
mod summary;
mod trust;

pub use client::SetupClient;
pub use config::{ClientConfig, DEFAULT_PORT, ListenerConfig};
pub use error::{Error, Result, codes};
pub use gateway::{Gateway, NONCE_LENGTH};
pub use listener::TransportListener;
pub use manager::ManagementClient;
pub use summary::TransportSummary;
pub use trust::TrustList;
