//! Chat room server.
//!
//! ```sh
//! cargo run --example chat_server -- tcp://127.0.0.1:6000
//! ```

#[path = "chat_proto.rs"]
mod chat_proto;

use chat_proto::{ClientToServer, ServerToClient};
use courier::server::ServerBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> courier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:6000".to_string());

    let server = ServerBuilder::<ClientToServer, ServerToClient>::new(&uri)
        .handle("connect_req", |msg, ctx| async move {
            if let ClientToServer::ConnectReq { user } = msg {
                println!("{user} joined from {}", ctx.peer_addr());
            }
            if ctx.begin("connect_rsp").is_ok() {
                let _ = ctx.reply().await;
            }
        })
        .handle("message_ind", |msg, ctx| async move {
            let ClientToServer::MessageInd { user, text } = msg else {
                return;
            };
            {
                let pending = ctx.begin("message_ind");
                if let Ok(mut ind) = pending {
                    if let ServerToClient::MessageInd {
                        user: out_user,
                        text: out_text,
                    } = &mut *ind
                    {
                        *out_user = user;
                        *out_text = text;
                    }
                }
            }
            let _ = ctx.broadcast().await;
        })
        .on_client_disconnected(|peer| async move {
            println!("{peer} left");
        })
        .build()?;

    server.start().await?;
    println!("chat server listening on {uri}");

    tokio::signal::ctrl_c().await?;
    server.stop();
    Ok(())
}
