//! Accept loop that authenticates control connections against the trust list.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tpsetup_engine::{RouteTrust, TransportEngine};
use tpsetup_overlay::{Listener, Overlay, Stream};
use tpsetup_rpc::RpcServer;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::ListenerConfig;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::protocol::SERVICE_NAME;
use crate::trust::TrustList;

/// Serves the transport gateway to trusted peers.
///
/// Streams from peers outside the trust list are closed without a reply.
/// Each trusted stream gets its own [`Gateway`], served on its own task.
pub struct TransportListener<O, E, R>
where
    O: Overlay,
    E: TransportEngine,
    R: RouteTrust,
{
    overlay: O,
    engine: E,
    route_trust: R,
    trust_list: Arc<TrustList>,
    config: ListenerConfig,
    span: Span,
}

impl<O, E, R> TransportListener<O, E, R>
where
    O: Overlay,
    E: TransportEngine,
    R: RouteTrust,
{
    /// Create a listener; nothing is bound until [`Self::listen_and_serve`].
    pub fn new(
        overlay: O,
        engine: E,
        route_trust: R,
        trust_list: TrustList,
        config: ListenerConfig,
    ) -> Self {
        let span = info_span!("transport_setup", local_pk = %overlay.local_pk());
        Self {
            overlay,
            engine,
            route_trust,
            trust_list: Arc::new(trust_list),
            config,
            span,
        }
    }

    /// Record everything this listener logs under `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The peers allowed to connect.
    pub fn trust_list(&self) -> &TrustList {
        &self.trust_list
    }

    /// Bind the control port and serve until `cancel` fires.
    ///
    /// Cancellation closes the listener; connections already being served are
    /// left to finish on their own.
    ///
    /// # Errors
    ///
    /// - [`Error::Bind`] if the port cannot be bound
    /// - [`Error::Accept`] if accepting fails for any reason other than the
    ///   listener being closed; the loop does not restart itself
    pub async fn listen_and_serve(&self, cancel: CancellationToken) -> Result<()> {
        let port = self.config.port;
        let listener = self
            .overlay
            .listen(port)
            .await
            .map_err(|source| Error::Bind { port, source })?;
        let listener = Arc::new(listener);
        info!(parent: &self.span, "Listening for transport setup connections on {}", listener.addr());

        let watcher = tokio::spawn({
            let listener = Arc::clone(&listener);
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
                debug!("Shutdown requested, closing listener");
                if let Err(e) = listener.close().await {
                    debug!("Listener already closed: {}", e);
                }
            }
            .instrument(self.span.clone())
        });

        let result = self.accept_loop(listener.as_ref()).await;

        watcher.abort();
        let _ = listener.close().await;
        result
    }

    async fn accept_loop(&self, listener: &O::Listener) -> Result<()> {
        loop {
            match listener.accept_stream().await {
                Ok(stream) => self.handle_stream(stream),
                Err(e) if e.is_closed() => {
                    info!(parent: &self.span, "Listener closed, stopping");
                    return Ok(());
                }
                Err(e) => {
                    error!(parent: &self.span, "Failed to accept stream: {}", e);
                    return Err(Error::Accept(e));
                }
            }
        }
    }

    fn handle_stream(&self, stream: O::Stream) {
        let remote_pk = stream.remote_addr().pk;

        if !self.trust_list.contains(&remote_pk) {
            warn!(parent: &self.span, "Rejected connection from untrusted peer {}", remote_pk);
            drop(stream);
            return;
        }

        let span = info_span!(parent: &self.span, "gateway", remote_pk = %remote_pk);
        let gateway = Gateway::new(
            self.engine.clone(),
            self.route_trust.clone(),
            remote_pk,
            self.config.save_timeout(),
            span.clone(),
        );

        debug!(parent: &span, "Serving trusted peer");
        tokio::spawn(
            async move {
                match RpcServer::new(SERVICE_NAME, gateway).serve(stream).await {
                    Ok(()) => debug!("Peer disconnected"),
                    Err(e) => warn!("Connection ended with error: {}", e),
                }
            }
            .instrument(span),
        );
    }
}
