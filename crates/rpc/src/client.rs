//! RPC client implementation.

use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameCodec, FrameKind, Request, Response, codec};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, instrument, warn};

/// Outgoing frames queued ahead of the writer task.
const OUTGOING_QUEUE_SIZE: usize = 64;

type PendingCalls = Arc<DashMap<u64, oneshot::Sender<Response>>>;

/// Builder for creating RPC clients.
#[derive(Debug)]
pub struct ClientBuilder {
    service: String,
    timeout: Option<Duration>,
    max_frame_size: Option<usize>,
    span: Option<Span>,
}

impl ClientBuilder {
    /// Create a new client builder for calls into `service`.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            timeout: None,
            max_frame_size: None,
            span: None,
        }
    }

    /// Bound every call by `timeout`. Without one, calls wait indefinitely.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum frame size accepted and produced by the client.
    #[must_use]
    pub const fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Span the client's background tasks and calls are recorded under.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Take ownership of `stream` and start serving calls over it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<S>(self, stream: S) -> RpcClient
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let span = self
            .span
            .unwrap_or_else(|| tracing::debug_span!("rpc_client", service = %self.service));
        let codec = || {
            self.max_frame_size
                .map_or_else(FrameCodec::new, |size| FrameCodec::new().with_max_frame_size(size))
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FramedRead::new(read_half, codec());
        let writer = FramedWrite::new(write_half, codec());

        let pending: PendingCalls = Arc::new(DashMap::new());
        let closed = CancellationToken::new();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);

        tokio::spawn(
            read_loop(reader, Arc::clone(&pending), closed.clone()).instrument(span.clone()),
        );
        let writer_task =
            tokio::spawn(write_loop(writer, outgoing_rx, closed.clone()).instrument(span.clone()));

        RpcClient {
            service: self.service,
            timeout: self.timeout,
            next_seq: AtomicU64::new(0),
            pending,
            outgoing_tx,
            closed,
            writer_task: Mutex::new(Some(writer_task)),
            span,
        }
    }
}

/// RPC client owning one stream.
///
/// A call that exceeds the configured timeout closes the whole connection:
/// the client is unusable afterwards and the caller has to reconnect.
pub struct RpcClient {
    service: String,
    timeout: Option<Duration>,
    next_seq: AtomicU64,
    pending: PendingCalls,
    outgoing_tx: mpsc::Sender<Frame>,
    closed: CancellationToken,
    writer_task: Mutex<Option<JoinHandle<Result<()>>>>,
    span: Span,
}

impl RpcClient {
    /// Create a new client builder.
    #[must_use]
    pub fn builder(service: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(service)
    }

    /// Service name every method is prefixed with.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Per-call timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the connection has been closed, locally or by the peer.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Call `<service>.<method>` with `args` and wait for the reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the connection was already closed
    /// - [`Error::Timeout`] if the configured timeout elapsed; the connection
    ///   is closed as a side effect
    /// - [`Error::ConnectionLost`] if the peer went away before replying
    /// - [`Error::Remote`] if the server answered with an error
    #[instrument(parent = &self.span, skip(self, args))]
    pub async fn call<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            seq,
            method: format!("{}.{method}", self.service),
            payload: codec::encode(args)?,
        };
        let frame = Frame::new(FrameKind::Request, codec::encode(&request)?);

        let response = match self.timeout {
            Some(timeout) => {
                if let Ok(result) = tokio::time::timeout(timeout, self.exchange(seq, frame)).await {
                    result
                } else {
                    self.pending.remove(&seq);
                    warn!("Call {} timed out after {:?}, closing connection", seq, timeout);
                    self.closed.cancel();
                    return Err(Error::Timeout(timeout));
                }
            }
            None => self.exchange(seq, frame).await,
        }?;

        if let Some(error) = response.error {
            debug!("Call {} failed remotely: {}", seq, error);
            return Err(Error::Remote(error));
        }

        codec::decode(&response.payload)
    }

    async fn exchange(&self, seq: u64, frame: Frame) -> Result<Response> {
        let (response_tx, response_rx) = oneshot::channel();
        self.pending.insert(seq, response_tx);

        if self.outgoing_tx.send(frame).await.is_err() {
            self.pending.remove(&seq);
            return Err(Error::Closed);
        }

        tokio::select! {
            biased;
            response = response_rx => response.map_err(|_| Error::ConnectionLost),
            () = self.closed.cancelled() => {
                self.pending.remove(&seq);
                Err(Error::ConnectionLost)
            }
        }
    }

    /// Close the connection.
    ///
    /// Pending calls fail with [`Error::ConnectionLost`]. Closing an already
    /// closed client succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error raised while shutting the stream down, if any.
    pub async fn close(&self) -> Result<()> {
        self.closed.cancel();

        let writer_task = self.writer_task.lock().take();
        match writer_task {
            Some(handle) => handle
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?,
            None => Ok(()),
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("service", &self.service)
            .field("timeout", &self.timeout)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Route incoming responses to their waiting calls.
async fn read_loop<S>(
    mut reader: FramedRead<ReadHalf<S>, FrameCodec>,
    pending: PendingCalls,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            () = closed.cancelled() => break,
            frame = reader.next() => match frame {
                Some(Ok(frame)) if frame.kind == FrameKind::Response => {
                    match codec::decode::<Response>(&frame.payload) {
                        Ok(response) => {
                            if let Some((_, sender)) = pending.remove(&response.seq) {
                                let _ = sender.send(response);
                            } else {
                                warn!("Received response for unknown call {}", response.seq);
                            }
                        }
                        Err(e) => {
                            error!("Failed to decode response: {}", e);
                            break;
                        }
                    }
                }
                Some(Ok(frame)) => {
                    warn!("Unexpected frame kind: {:?}", frame.kind);
                }
                Some(Err(e)) => {
                    error!("Stream error: {}", e);
                    break;
                }
                None => {
                    debug!("Connection closed by peer");
                    break;
                }
            }
        }
    }

    closed.cancel();
    pending.clear();
}

/// Feed queued frames into the stream until the connection closes.
async fn write_loop<S>(
    mut writer: FramedWrite<WriteHalf<S>, FrameCodec>,
    mut outgoing_rx: mpsc::Receiver<Frame>,
    closed: CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            frame = outgoing_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        tokio::select! {
            biased;
            () = closed.cancelled() => break,
            sent = writer.send(frame) => {
                if let Err(e) = sent {
                    error!("Failed to send frame: {}", e);
                    closed.cancel();
                    return Err(Error::Io(e));
                }
            }
        }
    }

    closed.cancel();
    debug!("Shutting down connection");
    writer.into_inner().shutdown().await.map_err(Error::Io)
}
