//! Message framing for the wire protocol.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum frame payload size (4MB by default).
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Frame header size (4 bytes length + 1 byte kind + 4 bytes checksum).
pub const FRAME_HEADER_SIZE: usize = 9;

/// Kind of frame being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Request frame.
    Request = 0x01,
    /// Response frame.
    Response = 0x02,
}

impl TryFrom<u8> for FrameKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> std::result::Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(Self::Request),
            0x02 => Ok(Self::Response),
            other => Err(ProtocolError::UnknownFrameKind(other)),
        }
    }
}

/// A frame in the wire protocol.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Kind of this frame.
    pub kind: FrameKind,
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub const fn new(kind: FrameKind, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    fn checksum(&self) -> u32 {
        crc32fast::hash(&self.payload)
    }
}

/// Codec for encoding/decoding frames.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new frame codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with custom max frame size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_data(err: crate::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Peek at the header without consuming it
        let mut header = &buf[..FRAME_HEADER_SIZE];
        let payload_len = header.get_u32() as usize;
        let kind_byte = header.get_u8();
        let expected = header.get_u32();

        self.check_size(payload_len).map_err(invalid_data)?;

        let frame_len = FRAME_HEADER_SIZE + payload_len;
        if buf.len() < frame_len {
            buf.reserve(frame_len - buf.len());
            return Ok(None);
        }

        let kind = FrameKind::try_from(kind_byte)
            .map_err(|e| invalid_data(e.into()))?;

        buf.advance(FRAME_HEADER_SIZE);
        let frame = Frame::new(kind, buf.split_to(payload_len).freeze());

        let actual = frame.checksum();
        if expected != actual {
            return Err(invalid_data(
                ProtocolError::ChecksumMismatch { expected, actual }.into(),
            ));
        }

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, buf: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let payload_len = frame.payload.len();
        self.check_size(payload_len).map_err(invalid_data)?;

        buf.reserve(FRAME_HEADER_SIZE + payload_len);

        #[allow(clippy::cast_possible_truncation)]
        buf.put_u32(payload_len as u32);
        buf.put_u8(frame.kind as u8);
        buf.put_u32(frame.checksum());
        buf.put(frame.payload);

        Ok(())
    }
}
