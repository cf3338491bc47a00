//! Hand-written bindings for the demo chat protocol.

use courier::envelope::Envelope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Serialize, Deserialize)]
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
