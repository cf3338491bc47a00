//! Shared fixtures for the integration tests: hand-written chat
//! protocol bindings and raw frame helpers for scripted peers.

#![allow(dead_code)]

use courier::envelope::Envelope;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Client-to-server envelope of the chat protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientToServer {
    #[serde(rename = "connect_req")]
    ConnectReq { user: String },
    #[serde(rename = "message_ind")]
    MessageInd { user: String, text: String },
}

impl Envelope for ClientToServer {
    const VARIANTS: &'static [&'static str] = &["connect_req", "message_ind"];

    fn variant(&self) -> Option<&'static str> {
        match self {
            ClientToServer::ConnectReq { .. } => Some("connect_req"),
            ClientToServer::MessageInd { .. } => Some("message_ind"),
        }
    }

    fn empty(variant: &str) -> Option<Self> {
        match variant {
            "connect_req" => Some(ClientToServer::ConnectReq {
                user: String::new(),
            }),
            "message_ind" => Some(ClientToServer::MessageInd {
                user: String::new(),
                text: String::new(),
            }),
            _ => None,
        }
    }
}

/// Server-to-client envelope of the chat protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerToClient {
    #[serde(rename = "connect_rsp")]
    ConnectRsp,
    #[serde(rename = "message_ind")]
    MessageInd { user: String, text: String },
}

impl Envelope for ServerToClient {
    const VARIANTS: &'static [&'static str] = &["connect_rsp", "message_ind"];

    fn variant(&self) -> Option<&'static str> {
        match self {
            ServerToClient::ConnectRsp => Some("connect_rsp"),
            ServerToClient::MessageInd { .. } => Some("message_ind"),
        }
    }

    fn empty(variant: &str) -> Option<Self> {
        match variant {
            "connect_rsp" => Some(ServerToClient::ConnectRsp),
            "message_ind" => Some(ServerToClient::MessageInd {
                user: String::new(),
                text: String::new(),
            }),
            _ => None,
        }
    }
}

/// Read one raw frame (kind byte, payload bytes) from a scripted peer.
pub async fn read_raw_frame<R: AsyncRead + Unpin>(reader: &mut R) -> (u8, Vec<u8>) {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).await.unwrap();
    let length = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await.unwrap();
    (header[0], payload)
}

/// Write one raw frame from a scripted peer.
pub async fn write_raw_frame<W: AsyncWrite + Unpin>(writer: &mut W, kind: u8, payload: &[u8]) {
    let len = (payload.len() as u32).to_be_bytes();
    writer
        .write_all(&[kind, len[1], len[2], len[3]])
        .await
        .unwrap();
    writer.write_all(payload).await.unwrap();
    writer.flush().await.unwrap();
}

/// Encode an envelope the way the engine does.
pub fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    rmp_serde::to_vec_named(value).unwrap()
}

/// Decode a payload the way the engine does.
pub fn decode<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> T {
    rmp_serde::from_slice(payload).unwrap()
}
