//! Method-call RPC over a single byte stream.
//!
//! One stream carries one client and one server. Calls are addressed as
//! `<Service>.<Method>`, carry CBOR payloads, and are answered by exactly one
//! reply or one error.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tpsetup_rpc::RpcClient;
//!
//! async fn example(stream: tokio::io::DuplexStream) -> tpsetup_rpc::Result<()> {
//!     let client = RpcClient::builder("Echo")
//!         .timeout(Duration::from_secs(5))
//!         .connect(stream);
//!
//!     let reply: String = client.call("Say", "hello").await?;
//!     assert_eq!(reply, "hello");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

// Re-export commonly used types
pub use client::{ClientBuilder, RpcClient};
pub use error::{CodecError, Error, ProtocolError, Result};
pub use protocol::codec;
pub use protocol::message::{ErrorInfo, Request, Response};
pub use server::{RpcHandler, RpcServer};

// Re-export dependencies that are part of our public API
pub use bytes::Bytes;
