//! courier — typed request/indication messaging over TCP.
//!
//! A small protocol engine: length-prefixed frames carry
//! MessagePack-encoded envelope enums in each direction, a keep-alive
//! Ping/Pong exchange detects dead peers, and a supervisor reconnects
//! the client side automatically.
//!
//! # Quick start
//!
//! ```no_run
//! use courier::client::ClientBuilder;
//! use courier::envelope::Envelope;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! enum ClientToServer {
//!     #[serde(rename = "connect_req")]
//!     ConnectReq { user: String },
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! enum ServerToClient {
//!     #[serde(rename = "connect_rsp")]
//!     ConnectRsp,
//! }
//!
//! # impl Envelope for ClientToServer {
//! #     const VARIANTS: &'static [&'static str] = &["connect_req"];
//! #     fn variant(&self) -> Option<&'static str> { Some("connect_req") }
//! #     fn empty(v: &str) -> Option<Self> {
//! #         (v == "connect_req").then(|| Self::ConnectReq { user: String::new() })
//! #     }
//! # }
//! # impl Envelope for ServerToClient {
//! #     const VARIANTS: &'static [&'static str] = &["connect_rsp"];
//! #     fn variant(&self) -> Option<&'static str> { Some("connect_rsp") }
//! #     fn empty(v: &str) -> Option<Self> {
//! #         (v == "connect_rsp").then(|| Self::ConnectRsp)
//! #     }
//! # }
//! #
//! # async fn run() -> courier::Result<()> {
//! let client = ClientBuilder::<ClientToServer, ServerToClient>::new("tcp://127.0.0.1:6000")
//!     .on_connected(|ctx| async move {
//!         if let Ok(mut req) = ctx.begin("connect_req") {
//!             if let ClientToServer::ConnectReq { user } = &mut *req {
//!                 *user = "Erik".to_string();
//!             }
//!         }
//!         let _ = ctx.send().await;
//!     })
//!     .handle("connect_rsp", |_msg, _ctx| async move {
//!         println!("connected and acknowledged");
//!     })
//!     .build()?;
//!
//! client.start();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod keep_alive;
pub mod output;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod uri;
pub mod writer;

pub use client::{Client, ClientBuilder, ClientContext};
pub use codec::{MsgPackCodec, PayloadCodec};
pub use dispatch::{DispatcherBuilder, MessageDispatcher};
pub use envelope::Envelope;
pub use error::{ConnectError, CourierError, Result, SchemaError};
pub use keep_alive::KeepAliveConfig;
pub use output::{OutputBuilder, PendingMessage};
pub use protocol::{Frame, FrameKind, FrameReader, Header};
pub use server::{ReplyContext, Server, ServerBuilder};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
