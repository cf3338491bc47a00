//! Wire format encoding and decoding.
//!
//! Implements the 4-byte frame header:
//! ```text
//! ┌───────┬───────────┐
//! │ Kind  │ Length    │
//! │ 1 byte│ 3 bytes   │
//! │ u8    │ u24 BE    │
//! └───────┴───────────┘
//! ```
//!
//! The length field counts payload bytes only. Ping and Pong frames
//! always carry a zero-length payload, so they encode to fixed 4-byte
//! sequences.

use crate::error::{CourierError, Result};

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Maximum payload size representable by the 24-bit length field.
pub const MAX_PAYLOAD_SIZE: usize = 0xFF_FFFF;

/// The fixed Ping frame: kind 3, zero-length payload.
pub const PING_FRAME: [u8; HEADER_SIZE] = [0x03, 0x00, 0x00, 0x00];

/// The fixed Pong frame: kind 4, zero-length payload.
pub const PONG_FRAME: [u8; HEADER_SIZE] = [0x04, 0x00, 0x00, 0x00];

/// Frame kind on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// User message sent by the client side.
    ClientToServerUser = 1,
    /// User message sent by the server side.
    ServerToClientUser = 2,
    /// Keep-alive probe.
    Ping = 3,
    /// Keep-alive probe reply.
    Pong = 4,
}

impl FrameKind {
    /// Map a raw kind byte to a known frame kind.
    ///
    /// Returns `None` for undefined kinds; the read loop decides what
    /// to do with those.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ClientToServerUser),
            2 => Some(Self::ServerToClientUser),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            _ => None,
        }
    }

    /// The raw kind byte.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw kind byte. Undefined values are passed through for the
    /// caller to reject.
    pub kind: u8,
    /// Payload length in bytes (0..=0xFFFFFF by construction).
    pub length: u32,
}

impl Header {
    /// Create a header for a known frame kind.
    pub fn new(kind: FrameKind, length: u32) -> Self {
        Self {
            kind: kind.as_u8(),
            length,
        }
    }

    /// Encode header to bytes (Big Endian u24 length).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.length.to_be_bytes();
        [self.kind, len[1], len[2], len[3]]
    }

    /// Decode a header from exactly 4 bytes.
    ///
    /// Pure and infallible: any 4 bytes form a header. A u24 length can
    /// never exceed [`MAX_PAYLOAD_SIZE`].
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            kind: buf[0],
            length: u32::from_be_bytes([0, buf[1], buf[2], buf[3]]),
        }
    }

    /// The frame kind, if the kind byte is defined.
    #[inline]
    pub fn frame_kind(&self) -> Option<FrameKind> {
        FrameKind::from_u8(self.kind)
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Errors
///
/// Returns `PayloadTooLarge` if the payload does not fit in the 24-bit
/// length field.
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CourierError::PayloadTooLarge(payload.len()));
    }

    let header = Header::new(kind, payload.len() as u32);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);

    Ok(buf)
}
