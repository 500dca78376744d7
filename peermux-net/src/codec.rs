//! Streaming encoder/decoder for wire frames.
//!
//! The decoder accumulates bytes from the socket and yields complete
//! frames as they become available, tolerating arbitrary read
//! boundaries.

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::frame::WireFrame;

/// Encodes frames for transmission.
pub struct Encoder;

impl Encoder {
    /// Encodes a text message into wire bytes.
    pub fn encode_text(message: impl Into<String>) -> Result<Bytes> {
        WireFrame::text(message).encode()
    }

    /// Encodes a binary payload into wire bytes.
    pub fn encode_binary(payload: impl Into<Bytes>) -> Result<Bytes> {
        WireFrame::binary(payload).encode()
    }
}

/// Accumulates socket reads and yields complete frames.
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends raw bytes read from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pops the next complete frame, or `Ok(None)` if more bytes are
    /// needed.
    pub fn decode_frame(&mut self) -> Result<Option<WireFrame>> {
        WireFrame::decode(&mut self.buffer)
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
