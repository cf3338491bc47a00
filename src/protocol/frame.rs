//! Frame struct with typed accessors.
//!
//! Represents a complete wire unit with kind and payload. Uses
//! `bytes::Bytes` for zero-copy payload sharing.

use bytes::Bytes;

use super::wire::FrameKind;

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw kind byte from the header.
    pub kind: u8,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from a raw kind byte and payload.
    pub fn new(kind: u8, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    /// The frame kind, if the kind byte is defined.
    #[inline]
    pub fn frame_kind(&self) -> Option<FrameKind> {
        FrameKind::from_u8(self.kind)
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_accessors() {
        let frame = Frame::new(2, Bytes::from_static(b"hello"));

        assert_eq!(frame.frame_kind(), Some(FrameKind::ServerToClientUser));
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.payload_len(), 5);
    }

    #[test]
    fn frame_undefined_kind() {
        let frame = Frame::new(0xAA, Bytes::new());

        assert_eq!(frame.frame_kind(), None);
        assert!(frame.payload().is_empty());
    }
}
