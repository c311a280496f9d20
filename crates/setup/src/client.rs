//! Typed client for a remote transport gateway.

use std::time::Duration;

use bytes::Bytes;
use tpsetup_engine::{TransportId, TransportType};
use tpsetup_overlay::{Addr, Overlay, PeerId, Stream};
use tpsetup_rpc::RpcClient;
use tracing::{Span, debug, info_span};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{
    ADD_TRANSPORT, AddTransportRequest, CHALLENGE, GET_TRANSPORTS, REMOVE_TRANSPORT, RESPONSE,
    SERVICE_NAME,
};
use crate::summary::TransportSummary;

/// RPC session with one remote node's gateway.
///
/// A call that times out closes the session; later calls fail and the caller
/// has to connect again.
#[derive(Debug)]
pub struct SetupClient {
    rpc: RpcClient,
    remote_pk: PeerId,
}

impl SetupClient {
    /// Wrap an already open stream to a gateway.
    pub fn new<S: Stream>(stream: S, call_timeout: Option<Duration>, span: Span) -> Self {
        let remote_pk = stream.remote_addr().pk;
        let builder = RpcClient::builder(SERVICE_NAME).span(span);
        let rpc = match call_timeout {
            Some(timeout) => builder.timeout(timeout).connect(stream),
            None => builder.connect(stream),
        };

        Self { rpc, remote_pk }
    }

    /// Dial the gateway of `remote_pk` on the configured control port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overlay`] if the peer cannot be reached.
    pub async fn dial<O: Overlay>(overlay: &O, remote_pk: PeerId, config: &ClientConfig) -> Result<Self> {
        let span = info_span!("setup_client", remote_pk = %remote_pk);
        let stream = overlay.dial(Addr::new(remote_pk, config.port)).await?;
        debug!(parent: &span, "Connected to transport gateway");

        Ok(Self::new(stream, config.call_timeout(), span))
    }

    /// The node this client talks to.
    pub const fn remote_pk(&self) -> PeerId {
        self.remote_pk
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.rpc.is_closed()
    }

    /// Ask the remote node to set up a transport to `remote_pk`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error, or [`Error::CallTimeout`] if the call
    /// timed out.
    pub async fn add_transport(
        &self,
        remote_pk: PeerId,
        transport_type: impl Into<TransportType>,
        timeout: Duration,
    ) -> Result<TransportSummary> {
        let request = AddTransportRequest {
            remote_pk,
            transport_type: transport_type.into(),
            timeout,
        };
        Ok(self.rpc.call(ADD_TRANSPORT, &request).await?)
    }

    /// Ask the remote node to remove the setup-owned transport `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncorrectType`] if the transport is not setup-owned,
    /// [`Error::TransportNotFound`] if it does not exist.
    pub async fn remove_transport(&self, id: TransportId) -> Result<()> {
        Ok(self.rpc.call(REMOVE_TRANSPORT, &id).await?)
    }

    /// List the remote node's setup-owned transports.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error or a transport failure.
    pub async fn get_transports(&self) -> Result<Vec<TransportSummary>> {
        Ok(self.rpc.call(GET_TRANSPORTS, &()).await?)
    }

    /// Request a handshake nonce.
    ///
    /// # Errors
    ///
    /// Returns a transport failure.
    pub async fn challenge(&self) -> Result<Bytes> {
        Ok(self.rpc.call(CHALLENGE, &()).await?)
    }

    /// Answer the last nonce with an ed25519 `signature` over it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the gateway rejects the signature.
    pub async fn response(&self, signature: &[u8]) -> Result<()> {
        Ok(self
            .rpc
            .call(RESPONSE, &Bytes::copy_from_slice(signature))
            .await?)
    }

    /// Close the session. Closing twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns the error raised while shutting the stream down.
    pub async fn close(&self) -> Result<()> {
        self.rpc.close().await.map_err(Error::Rpc)
    }
}
