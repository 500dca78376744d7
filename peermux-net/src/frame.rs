//! Binary frame layout for peer links.
//!
//! Every message travels as one length-prefixed frame:
//!
//! ```text
//! +-------+---------+-------+-------------+----------+-----------+
//! | magic | version | flags | payload_len | checksum | payload   |
//! | 4B    | 2B      | 2B    | 4B          | 4B       | variable  |
//! +-------+---------+-------+-------------+----------+-----------+
//! ```
//!
//! All integers are big-endian. The checksum is CRC32C over the payload
//! bytes. Text frames carry UTF-8; binary frames set the `FLAG_BINARY`
//! bit and carry opaque bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{NetError, Result};

/// Magic bytes identifying a peermux frame.
pub const MAGIC: [u8; 4] = *b"PMUX";

/// Current frame layout version.
pub const WIRE_VERSION: u16 = 1;

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Maximum allowed payload size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Payload carries opaque bytes rather than UTF-8 text.
pub const FLAG_BINARY: u16 = 1 << 0;

const VALID_FLAGS_MASK: u16 = FLAG_BINARY;

/// How the payload of a frame should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// A single wire frame: a payload tagged text or binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl WireFrame {
    /// Creates a text frame from a message string.
    pub fn text(message: impl Into<String>) -> Self {
        WireFrame {
            kind: FrameKind::Text,
            payload: Bytes::from(message.into()),
        }
    }

    /// Creates a binary frame from raw bytes.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        WireFrame {
            kind: FrameKind::Binary,
            payload: payload.into(),
        }
    }

    /// Consumes the frame and returns its payload as UTF-8 text.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.payload.to_vec()).map_err(|_| NetError::InvalidUtf8)
    }

    /// Serializes the frame into a byte buffer ready for the wire.
    pub fn encode(&self) -> Result<Bytes> {
        if self.payload.len() > MAX_FRAME_SIZE {
            return Err(NetError::FrameTooLarge {
                size: self.payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let flags = match self.kind {
            FrameKind::Text => 0,
            FrameKind::Binary => FLAG_BINARY,
        };
        let checksum = crc32c::crc32c(&self.payload);

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&MAGIC);
        buf.put_u16(WIRE_VERSION);
        buf.put_u16(flags);
        buf.put_u32(self.payload.len() as u32);
        buf.put_u32(checksum);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Attempts to decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// frame; the buffer is left untouched in that case. On success the
    /// consumed bytes are removed from `buf`.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<WireFrame>> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        // Peek the header without consuming so partial frames stay intact.
        let mut header = &buf[..FRAME_HEADER_SIZE];
        let mut magic = [0u8; 4];
        header.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(NetError::InvalidMagic(magic));
        }

        let version = header.get_u16();
        if version != WIRE_VERSION {
            return Err(NetError::UnsupportedVersion(version));
        }

        let flags = header.get_u16();
        if flags & !VALID_FLAGS_MASK != 0 {
            return Err(NetError::InvalidFlags(flags));
        }

        let payload_len = header.get_u32() as usize;
        if payload_len > MAX_FRAME_SIZE {
            return Err(NetError::FrameTooLarge {
                size: payload_len,
                max: MAX_FRAME_SIZE,
            });
        }

        let expected = header.get_u32();

        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        let actual = crc32c::crc32c(&payload);
        if actual != expected {
            return Err(NetError::CrcMismatch { expected, actual });
        }

        let kind = if flags & FLAG_BINARY != 0 {
            FrameKind::Binary
        } else {
            FrameKind::Text
        };
        Ok(Some(WireFrame { kind, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: &[u8]) -> Result<Option<WireFrame>> {
        let mut buf = BytesMut::from(bytes);
        WireFrame::decode(&mut buf)
    }

    #[test]
    fn text_frame_round_trip() {
        let frame = WireFrame::text("H1.0.0\nnode-a");
        let encoded = frame.encode().unwrap();

        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = WireFrame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.kind, FrameKind::Text);
        assert_eq!(decoded.into_text().unwrap(), "H1.0.0\nnode-a");
        assert!(buf.is_empty());
    }

    #[test]
    fn binary_frame_round_trip() {
        let frame = WireFrame::binary(vec![0u8, 159, 146, 150]);
        let encoded = frame.encode().unwrap();

        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = WireFrame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.kind, FrameKind::Binary);
        assert_eq!(&decoded.payload[..], &[0u8, 159, 146, 150]);
    }

    #[test]
    fn empty_payload_round_trip() {
        let frame = WireFrame::text("");
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded.len(), FRAME_HEADER_SIZE);

        let decoded = decode_one(&encoded).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 0);
    }

    #[test]
    fn incomplete_header_returns_none() {
        let mut buf = BytesMut::from(&b"PMU"[..]);
        assert!(WireFrame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn incomplete_payload_returns_none() {
        let encoded = WireFrame::text("hello world").encode().unwrap();
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 4]);
        assert!(WireFrame::decode(&mut buf).unwrap().is_none());
        // Nothing consumed until the full frame arrives.
        assert_eq!(buf.len(), encoded.len() - 4);
    }

    #[test]
    fn invalid_magic_is_rejected() {
        let mut encoded = WireFrame::text("x").encode().unwrap().to_vec();
        encoded[..4].copy_from_slice(b"BADX");
        match decode_one(&encoded) {
            Err(NetError::InvalidMagic(magic)) => assert_eq!(&magic, b"BADX"),
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut encoded = WireFrame::text("x").encode().unwrap().to_vec();
        encoded[4] = 0xff;
        encoded[5] = 0xff;
        match decode_one(&encoded) {
            Err(NetError::UnsupportedVersion(v)) => assert_eq!(v, 0xffff),
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let mut encoded = WireFrame::text("x").encode().unwrap().to_vec();
        encoded[6] = 0x80;
        match decode_one(&encoded) {
            Err(NetError::InvalidFlags(flags)) => assert_eq!(flags, 0x8000),
            other => panic!("expected InvalidFlags, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut encoded = WireFrame::text("payload").encode().unwrap().to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(
            decode_one(&encoded),
            Err(NetError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut encoded = WireFrame::text("x").encode().unwrap().to_vec();
        encoded[8..12].copy_from_slice(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());
        assert!(matches!(
            decode_one(&encoded),
            Err(NetError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_payload_refuses_to_encode() {
        let frame = WireFrame::binary(vec![0u8; MAX_FRAME_SIZE + 1]);
        assert!(matches!(
            frame.encode(),
            Err(NetError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn multiple_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&WireFrame::text("first").encode().unwrap());
        buf.extend_from_slice(&WireFrame::text("second").encode().unwrap());

        let a = WireFrame::decode(&mut buf).unwrap().unwrap();
        let b = WireFrame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(a.into_text().unwrap(), "first");
        assert_eq!(b.into_text().unwrap(), "second");
        assert!(WireFrame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn non_utf8_text_payload_is_reported() {
        let frame = WireFrame {
            kind: FrameKind::Text,
            payload: Bytes::from_static(&[0xff, 0xfe]),
        };
        assert!(matches!(frame.into_text(), Err(NetError::InvalidUtf8)));
    }
}
