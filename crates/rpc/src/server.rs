//! RPC server implementation.

use crate::error::Result;
use crate::protocol::framing::MAX_FRAME_SIZE;
use crate::protocol::message::REPLY_TOO_LARGE;
use crate::protocol::{ErrorInfo, Frame, FrameCodec, FrameKind, Request, Response, codec};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

/// Trait for handling RPC requests.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Handle one call to `method` (without the service prefix).
    ///
    /// `payload` holds the CBOR-encoded arguments; the returned bytes are the
    /// CBOR-encoded reply.
    async fn handle_message(
        &self,
        method: &str,
        payload: Bytes,
    ) -> std::result::Result<Bytes, ErrorInfo>;
}

/// Serves one service over one stream.
pub struct RpcServer<H: RpcHandler> {
    service: String,
    handler: H,
    max_frame_size: Option<usize>,
}

impl<H: RpcHandler> RpcServer<H> {
    /// Create a new RPC server exposing `handler` as `service`.
    pub fn new(service: impl Into<String>, handler: H) -> Self {
        Self {
            service: service.into(),
            handler,
            max_frame_size: None,
        }
    }

    /// Set the maximum frame size accepted and produced by the server.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// The handler behind this server.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Answer requests on `stream` until the peer disconnects.
    ///
    /// Requests are handled one at a time, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or carries malformed frames.
    pub async fn serve<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let codec = self
            .max_frame_size
            .map_or_else(FrameCodec::new, |size| FrameCodec::new().with_max_frame_size(size));
        let mut framed = Framed::new(stream, codec);

        while let Some(frame) = framed.next().await {
            let frame = frame?;
            if frame.kind != FrameKind::Request {
                warn!("Unexpected frame kind: {:?}", frame.kind);
                continue;
            }

            let request: Request = codec::decode(&frame.payload)?;
            let response = self.dispatch(request).await;
            let body = self.encode_response(response)?;
            framed.send(Frame::new(FrameKind::Response, body)).await?;
        }

        debug!("Connection closed by client");
        Ok(())
    }

    /// Encode `response`, swapping a reply too large for one frame for an error.
    fn encode_response(&self, response: Response) -> Result<Bytes> {
        let max = self.max_frame_size.unwrap_or(MAX_FRAME_SIZE);
        let body = codec::encode(&response)?;
        if body.len() <= max {
            return Ok(body);
        }

        warn!("Reply to call {} is {} bytes, limit is {}", response.seq, body.len(), max);
        codec::encode(&Response {
            seq: response.seq,
            payload: Bytes::new(),
            error: Some(ErrorInfo::new(
                REPLY_TOO_LARGE,
                format!("reply of {} bytes exceeds frame limit of {max}", body.len()),
            )),
        })
    }

    async fn dispatch(&self, request: Request) -> Response {
        trace!("Handling call {} to {}", request.seq, request.method);

        let result = match request
            .method
            .strip_prefix(self.service.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
        {
            Some(method) => self.handler.handle_message(method, request.payload).await,
            None => Err(ErrorInfo::method_not_found(&request.method)),
        };

        match result {
            Ok(payload) => Response {
                seq: request.seq,
                payload,
                error: None,
            },
            Err(error) => {
                debug!("Call {} to {} failed: {}", request.seq, request.method, error);
                Response {
                    seq: request.seq,
                    payload: Bytes::new(),
                    error: Some(error),
                }
            }
        }
    }
}
