//! Frame reading from an async byte stream.
//!
//! Reads exactly one header, then exactly `length` payload bytes. A
//! short read or end-of-stream is a transport failure surfaced as
//! [`CourierError::Frame`]; the connection owner treats it as a
//! disconnect.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::frame::Frame;
use super::wire::{Header, HEADER_SIZE};
use crate::error::{CourierError, Result};

/// Reads complete frames from an async byte stream.
///
/// The internal buffer is reused across frames to avoid per-frame
/// allocations.
pub struct FrameReader<R> {
    reader: R,
    payload_buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap an async reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            payload_buf: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read the next complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Frame`] on end-of-stream or a short
    /// read, and [`CourierError::Io`] on any other I/O failure. Both
    /// terminate the read loop.
    pub async fn next_frame(&mut self) -> Result<Frame> {
        let mut header_buf = [0u8; HEADER_SIZE];
        self.reader
            .read_exact(&mut header_buf)
            .await
            .map_err(map_read_error)?;

        let header = Header::decode(&header_buf);
        let length = header.length as usize;

        self.payload_buf.resize(length, 0);
        self.reader
            .read_exact(&mut self.payload_buf[..])
            .await
            .map_err(map_read_error)?;

        Ok(Frame::new(header.kind, self.payload_buf.split().freeze()))
    }
}

fn map_read_error(err: std::io::Error) -> CourierError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        CourierError::Frame("unexpected end of stream".to_string())
    } else {
        CourierError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::{encode_frame, FrameKind, PING_FRAME};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn read_single_frame() {
        let bytes = encode_frame(FrameKind::ServerToClientUser, b"payload").unwrap();
        let mut reader = FrameReader::new(&bytes[..]);

        let frame = reader.next_frame().await.unwrap();
        assert_eq!(frame.frame_kind(), Some(FrameKind::ServerToClientUser));
        assert_eq!(frame.payload(), b"payload");
    }

    #[tokio::test]
    async fn read_back_to_back_frames() {
        let mut bytes = encode_frame(FrameKind::ServerToClientUser, b"one").unwrap();
        bytes.extend_from_slice(&PING_FRAME);
        bytes.extend(encode_frame(FrameKind::ServerToClientUser, b"two").unwrap());
        let mut reader = FrameReader::new(&bytes[..]);

        assert_eq!(reader.next_frame().await.unwrap().payload(), b"one");
        assert_eq!(
            reader.next_frame().await.unwrap().frame_kind(),
            Some(FrameKind::Ping)
        );
        assert_eq!(reader.next_frame().await.unwrap().payload(), b"two");
    }

    #[tokio::test]
    async fn read_fragmented_frame() {
        let bytes = encode_frame(FrameKind::ServerToClientUser, b"fragmented").unwrap();
        let (client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(client);

        let writer_task = tokio::spawn(async move {
            let mut server = server;
            for chunk in bytes.chunks(3) {
                server.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let frame = reader.next_frame().await.unwrap();
        assert_eq!(frame.payload(), b"fragmented");
        writer_task.await.unwrap();
    }

    #[tokio::test]
    async fn eof_is_a_frame_error() {
        let mut reader = FrameReader::new(&[][..]);
        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(err, CourierError::Frame(_)));
    }

    #[tokio::test]
    async fn short_payload_is_a_frame_error() {
        // Header claims 8 payload bytes, stream carries only 3.
        let bytes = [0x02, 0x00, 0x00, 0x08, 0xAA, 0xBB, 0xCC];
        let mut reader = FrameReader::new(&bytes[..]);

        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(err, CourierError::Frame(_)));
    }
}
