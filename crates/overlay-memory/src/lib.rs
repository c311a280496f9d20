//! In-memory overlay implementation for testing
//!
//! This overlay routes streams between identities within the same process,
//! which is what tests and local tooling need. Every [`MemoryNetwork`] is its
//! own registry, so independent networks never see each other's listeners.

use std::fmt::Debug;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio_util::sync::CancellationToken;
use tpsetup_overlay::{Addr, Listener, Overlay, OverlayError, PeerId, Stream};
use tracing::{debug, info};

/// Bytes buffered in each direction of a memory stream.
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// First port handed out to dialing ends.
const FIRST_EPHEMERAL_PORT: u16 = 49152;

#[derive(Debug)]
struct Registry {
    listeners: DashMap<Addr, flume::Sender<MemoryStream>>,
    next_port: AtomicU16,
}

/// A process-local overlay network shared by any number of identities.
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    registry: Arc<Registry>,
}

impl MemoryNetwork {
    /// Create an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                listeners: DashMap::new(),
                next_port: AtomicU16::new(FIRST_EPHEMERAL_PORT),
            }),
        }
    }

    /// Create an overlay client that speaks as `pk` on this network.
    #[must_use]
    pub fn client(&self, pk: PeerId) -> MemoryOverlay {
        MemoryOverlay {
            pk,
            network: self.clone(),
        }
    }

    /// Whether some listener is bound at `addr`.
    #[must_use]
    pub fn is_listening(&self, addr: &Addr) -> bool {
        self.registry.listeners.contains_key(addr)
    }

    fn ephemeral_port(&self) -> u16 {
        let port = self.registry.next_port.fetch_add(1, Ordering::Relaxed);
        if port < FIRST_EPHEMERAL_PORT {
            // wrapped around
            self.registry
                .next_port
                .store(FIRST_EPHEMERAL_PORT + 1, Ordering::Relaxed);
            return FIRST_EPHEMERAL_PORT;
        }
        port
    }

    fn unregister(&self, addr: &Addr, own: &flume::Sender<MemoryStream>) {
        self.registry
            .listeners
            .remove_if(addr, |_, tx| tx.same_channel(own));
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay client bound to one identity of a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryOverlay {
    pk: PeerId,
    network: MemoryNetwork,
}

#[async_trait]
impl Overlay for MemoryOverlay {
    type Stream = MemoryStream;
    type Listener = MemoryListener;

    fn local_pk(&self) -> PeerId {
        self.pk
    }

    async fn listen(&self, port: u16) -> Result<MemoryListener, OverlayError> {
        let addr = Addr::new(self.pk, port);
        let (incoming_tx, incoming_rx) = flume::unbounded();

        match self.network.registry.listeners.entry(addr) {
            Entry::Occupied(_) => return Err(OverlayError::PortInUse(port)),
            Entry::Vacant(slot) => {
                slot.insert(incoming_tx.clone());
            }
        }

        info!("Memory listener bound at {}", addr);

        Ok(MemoryListener {
            addr,
            incoming_rx,
            incoming_tx,
            closed: CancellationToken::new(),
            network: self.network.clone(),
        })
    }

    async fn dial(&self, remote: Addr) -> Result<MemoryStream, OverlayError> {
        let incoming_tx = self
            .network
            .registry
            .listeners
            .get(&remote)
            .map(|tx| tx.value().clone())
            .ok_or(OverlayError::Unreachable(remote))?;

        let local = Addr::new(self.pk, self.network.ephemeral_port());
        let (client_io, server_io) = tokio::io::duplex(STREAM_BUFFER_SIZE);

        let server_stream = MemoryStream {
            inner: server_io,
            local: remote,
            remote: local,
        };

        incoming_tx
            .send_async(server_stream)
            .await
            .map_err(|_| OverlayError::Unreachable(remote))?;

        debug!("Memory stream {} -> {} established", local, remote);

        Ok(MemoryStream {
            inner: client_io,
            local,
            remote,
        })
    }
}

pin_project! {
    /// One end of an in-memory overlay stream.
    #[derive(Debug)]
    pub struct MemoryStream {
        #[pin]
        inner: DuplexStream,
        local: Addr,
        remote: Addr,
    }
}

impl Stream for MemoryStream {
    fn local_addr(&self) -> Addr {
        self.local
    }

    fn remote_addr(&self) -> Addr {
        self.remote
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().inner.poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

/// Listener bound to one address of a [`MemoryNetwork`].
pub struct MemoryListener {
    addr: Addr,
    incoming_rx: flume::Receiver<MemoryStream>,
    incoming_tx: flume::Sender<MemoryStream>,
    closed: CancellationToken,
    network: MemoryNetwork,
}

impl Debug for MemoryListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryListener")
            .field("addr", &self.addr)
            .field("closed", &self.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Listener for MemoryListener {
    type Stream = MemoryStream;

    async fn accept_stream(&self) -> Result<MemoryStream, OverlayError> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(OverlayError::Closed),
            stream = self.incoming_rx.recv_async() => {
                let stream = stream.map_err(|_| OverlayError::Closed)?;
                debug!("Memory listener {} accepted stream from {}", self.addr, stream.remote);
                Ok(stream)
            }
        }
    }

    async fn close(&self) -> Result<(), OverlayError> {
        if self.closed.is_cancelled() {
            return Err(OverlayError::Closed);
        }

        debug!("Closing memory listener {}", self.addr);
        self.closed.cancel();
        self.network.unregister(&self.addr, &self.incoming_tx);

        // Streams nobody will accept are dropped so their dialers see EOF.
        self.incoming_rx.drain().for_each(drop);

        Ok(())
    }

    fn addr(&self) -> Addr {
        self.addr
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.network.unregister(&self.addr, &self.incoming_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_listen_and_dial() {
        let _ = tracing_subscriber::fmt::try_init();

        let network = MemoryNetwork::new();
        let server_pk = PeerId::from_seed(1);
        let client_pk = PeerId::from_seed(2);

        let listener = network.client(server_pk).listen(47).await.unwrap();
        let mut client = network
            .client(client_pk)
            .dial(Addr::new(server_pk, 47))
            .await
            .unwrap();
        let mut server = listener.accept_stream().await.unwrap();

        assert_eq!(server.remote_addr().pk, client_pk);
        assert_eq!(server.local_addr(), Addr::new(server_pk, 47));
        assert_eq!(client.remote_addr(), Addr::new(server_pk, 47));
        assert_eq!(client.local_addr(), server.remote_addr());

        client.write_all(b"Hello, Memory!").await.unwrap();
        let mut buf = [0u8; 14];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"Hello, Memory!");

        server.write_all(b"back").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"back");
    }

    #[tokio::test]
    async fn test_port_already_bound() {
        let network = MemoryNetwork::new();
        let overlay = network.client(PeerId::from_seed(3));

        let _listener = overlay.listen(47).await.unwrap();
        assert!(matches!(
            overlay.listen(47).await,
            Err(OverlayError::PortInUse(47))
        ));
    }

    #[tokio::test]
    async fn test_dial_without_listener() {
        let network = MemoryNetwork::new();
        let target = Addr::new(PeerId::from_seed(4), 47);

        let result = network.client(PeerId::from_seed(5)).dial(target).await;
        assert!(matches!(result, Err(OverlayError::Unreachable(addr)) if addr == target));
    }

    #[tokio::test]
    async fn test_close_wakes_accept() {
        let network = MemoryNetwork::new();
        let pk = PeerId::from_seed(6);
        let listener = Arc::new(network.client(pk).listen(47).await.unwrap());

        let accepting = Arc::clone(&listener);
        let accept_task = tokio::spawn(async move { accepting.accept_stream().await });

        tokio::task::yield_now().await;
        listener.close().await.unwrap();

        let result = accept_task.await.unwrap();
        assert!(result.unwrap_err().is_closed());
        assert!(!network.is_listening(&Addr::new(pk, 47)));
        assert!(listener.close().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_dropped_stream_reads_eof() {
        let network = MemoryNetwork::new();
        let server_pk = PeerId::from_seed(7);

        let listener = network.client(server_pk).listen(47).await.unwrap();
        let mut client = network
            .client(PeerId::from_seed(8))
            .dial(Addr::new(server_pk, 47))
            .await
            .unwrap();
        drop(listener.accept_stream().await.unwrap());

        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rebind_after_drop() {
        let network = MemoryNetwork::new();
        let overlay = network.client(PeerId::from_seed(9));

        let first = overlay.listen(47).await.unwrap();
        first.close().await.unwrap();
        let _second = overlay.listen(47).await.unwrap();

        // Dropping the closed listener must not unregister its successor.
        drop(first);
        assert!(network.is_listening(&Addr::new(overlay.local_pk(), 47)));
    }
}
