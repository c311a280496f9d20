//! Protocol layer for the RPC framework.
//!
//! This module contains the wire definitions:
//! - Request/response envelopes
//! - Length-prefixed, checksummed framing
//! - CBOR payload codec

pub mod codec;
pub mod framing;
pub mod message;

pub use framing::{Frame, FrameCodec, FrameKind};
pub use message::{ErrorInfo, Request, Response};
