//! Dedicated writer task.
//!
//! All outbound frames for one connection funnel through a single
//! task, so a user message and a keep-alive probe can never interleave
//! their header and payload bytes on the wire. Senders hand over an
//! [`OutboundFrame`] via a bounded channel; the task owns the write
//! half of the socket.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{CourierError, Result};
use crate::protocol::wire::{FrameKind, Header, HEADER_SIZE, MAX_PAYLOAD_SIZE};

const WRITE_QUEUE_DEPTH: usize = 64;

/// A frame queued for writing: pre-encoded header plus payload.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub header: [u8; HEADER_SIZE],
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Build a user-message frame.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if the payload does not fit in the
    /// 24-bit length field.
    pub fn user(kind: FrameKind, payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CourierError::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            header: Header::new(kind, payload.len() as u32).encode(),
            payload,
        })
    }

    /// Build a zero-payload control frame (Ping or Pong).
    pub fn control(header: [u8; HEADER_SIZE]) -> Self {
        Self {
            header,
            payload: Bytes::new(),
        }
    }
}

/// Cloneable handle for queueing frames onto one connection's writer.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame for writing.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::NotConnected`] if the writer task has
    /// stopped, which means the connection is gone.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| CourierError::NotConnected)
    }
}

/// Spawn the writer task for one connection.
///
/// The task drains the queue until every sender drops or a write
/// fails. The returned handle is used by the connection owner to abort
/// the task on teardown.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
    let task = tokio::spawn(writer_loop(writer, rx));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut writer: W, mut rx: mpsc::Receiver<OutboundFrame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(err) = write_frame(&mut writer, &frame).await {
            debug!(error = %err, "write failed, stopping writer");
            break;
        }
        trace!(
            kind = frame.header[0],
            payload_len = frame.payload.len(),
            "frame written"
        );
    }
}

/// Write header and payload, continuing across partial vectored writes.
async fn write_frame<W>(writer: &mut W, frame: &OutboundFrame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0usize;
    let total = HEADER_SIZE + frame.payload.len();

    while written < total {
        let n = if written < HEADER_SIZE {
            let slices = [
                IoSlice::new(&frame.header[written..]),
                IoSlice::new(&frame.payload),
            ];
            writer.write_vectored(&slices).await?
        } else {
            writer.write(&frame.payload[written - HEADER_SIZE..]).await?
        };

        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        written += n;
    }

    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::PING_FRAME;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_header_then_payload() {
        let (client, mut server) = tokio::io::duplex(256);
        let (handle, task) = spawn_writer_task(client);

        let frame = OutboundFrame::user(
            FrameKind::ClientToServerUser,
            Bytes::from_static(b"abc"),
        )
        .unwrap();
        handle.send(frame).await.unwrap();
        drop(handle);
        task.await.unwrap();

        let mut buf = Vec::new();
        server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, [0x01, 0x00, 0x00, 0x03, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn control_frames_are_four_bytes() {
        let (client, mut server) = tokio::io::duplex(64);
        let (handle, task) = spawn_writer_task(client);

        handle.send(OutboundFrame::control(PING_FRAME)).await.unwrap();
        drop(handle);
        task.await.unwrap();

        let mut buf = Vec::new();
        server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, PING_FRAME);
    }

    #[tokio::test]
    async fn frames_are_not_interleaved() {
        let (client, mut server) = tokio::io::duplex(16);
        let (handle, task) = spawn_writer_task(client);

        let a = handle.clone();
        let b = handle.clone();
        let send_a = tokio::spawn(async move {
            let frame = OutboundFrame::user(
                FrameKind::ClientToServerUser,
                Bytes::from(vec![0xAA; 100]),
            )
            .unwrap();
            a.send(frame).await.unwrap();
        });
        let send_b = tokio::spawn(async move {
            let frame = OutboundFrame::user(
                FrameKind::ClientToServerUser,
                Bytes::from(vec![0xBB; 100]),
            )
            .unwrap();
            b.send(frame).await.unwrap();
        });

        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            server.read_to_end(&mut buf).await.unwrap();
            buf
        });

        send_a.await.unwrap();
        send_b.await.unwrap();
        drop(handle);
        task.await.unwrap();

        let buf = reader.await.unwrap();
        assert_eq!(buf.len(), 2 * (HEADER_SIZE + 100));
        // Each frame's payload is uniform, so any interleaving would
        // show up as mixed bytes inside a frame body.
        for frame in buf.chunks(HEADER_SIZE + 100) {
            assert_eq!(&frame[..HEADER_SIZE], &[0x01, 0x00, 0x00, 100]);
            let fill = frame[HEADER_SIZE];
            assert!(frame[HEADER_SIZE..].iter().all(|b| *b == fill));
        }
    }

    #[tokio::test]
    async fn send_after_writer_stops_is_not_connected() {
        let (client, server) = tokio::io::duplex(64);
        let (handle, task) = spawn_writer_task(client);

        drop(server);
        // First send may succeed into the buffer; keep writing until the
        // task notices the closed pipe and exits.
        let _ = handle
            .send(OutboundFrame::user(
                FrameKind::ClientToServerUser,
                Bytes::from(vec![0u8; 128]),
            )
            .unwrap())
            .await;
        task.await.unwrap();

        let err = handle
            .send(OutboundFrame::control(PING_FRAME))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::NotConnected));
    }

    #[test]
    fn oversized_user_frame_rejected() {
        let payload = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        let result = OutboundFrame::user(FrameKind::ClientToServerUser, payload);
        assert!(matches!(result, Err(CourierError::PayloadTooLarge(_))));
    }
}
