//! Overlay network abstraction for the transport setup control plane.
//!
//! The overlay is the peer-to-peer session layer that control connections
//! travel over. This crate only describes it:
//! - Peer identities ([`PeerId`]) and overlay addresses ([`Addr`])
//! - Listening on a port and accepting streams ([`Listener`])
//! - Dialing a peer's port ([`Overlay`])
//!
//! Concrete overlays live in separate crates.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod addr;
mod error;
mod peer_id;

pub use addr::Addr;
pub use error::OverlayError;
pub use peer_id::{PeerId, PeerIdError};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream between two overlay addresses.
///
/// Dropping the stream closes it; the remote end observes EOF.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Address of this end of the stream.
    fn local_addr(&self) -> Addr;

    /// Address of the other end of the stream, as authenticated by the overlay.
    fn remote_addr(&self) -> Addr;
}

/// A bound overlay port accepting inbound streams.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Stream type produced by this listener.
    type Stream: Stream;

    /// Wait for the next inbound stream.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Closed`] once the listener has been closed.
    async fn accept_stream(&self) -> Result<Self::Stream, OverlayError>;

    /// Close the listener, waking any pending [`Listener::accept_stream`].
    ///
    /// # Errors
    ///
    /// Returns an error if the listener was already closed.
    async fn close(&self) -> Result<(), OverlayError>;

    /// The address this listener is bound to.
    fn addr(&self) -> Addr;
}

/// An overlay network client bound to one local identity.
#[async_trait]
pub trait Overlay: Send + Sync + 'static {
    /// Stream type used by this overlay.
    type Stream: Stream;

    /// Listener type used by this overlay.
    type Listener: Listener<Stream = Self::Stream>;

    /// The identity this client speaks as.
    fn local_pk(&self) -> PeerId;

    /// Bind a listener on `port`.
    async fn listen(&self, port: u16) -> Result<Self::Listener, OverlayError>;

    /// Open a stream to `remote`.
    async fn dial(&self, remote: Addr) -> Result<Self::Stream, OverlayError>;
}
