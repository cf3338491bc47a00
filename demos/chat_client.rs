//! Interactive chat client. Type a line to send it to the room.
//!
//! ```sh
//! cargo run --example chat_client -- tcp://127.0.0.1:6000 Erik
//! ```

#[path = "chat_proto.rs"]
mod chat_proto;

use chat_proto::{ClientToServer, ServerToClient};
use courier::client::ClientBuilder;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> courier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let uri = args.next().unwrap_or_else(|| "tcp://127.0.0.1:6000".to_string());
    let user = args.next().unwrap_or_else(|| "anonymous".to_string());

    let client = {
        let user = user.clone();
        ClientBuilder::<ClientToServer, ServerToClient>::new(&uri)
            .on_connected(move |ctx| {
                let user = user.clone();
                async move {
                    if let Ok(mut req) = ctx.begin("connect_req") {
                        if let ClientToServer::ConnectReq { user: out } = &mut *req {
                            *out = user;
                        }
                    }
                    let _ = ctx.send().await;
                }
            })
            .on_disconnected(|| async {
                println!("(disconnected, retrying)");
            })
            .handle("connect_rsp", |_msg, _ctx| async {
                println!("(connected)");
            })
            .handle("message_ind", |msg, _ctx| async move {
                if let ServerToClient::MessageInd { user, text } = msg {
                    println!("<{user}> {text}");
                }
            })
            .build()?
    };
    client.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let Ok(ctx) = client.context() else {
            println!("(not connected yet)");
            continue;
        };
        if let Ok(mut ind) = ctx.begin("message_ind") {
            if let ClientToServer::MessageInd {
                user: out_user,
                text: out_text,
            } = &mut *ind
            {
                *out_user = user.clone();
                *out_text = text.to_string();
            }
        }
        if let Err(err) = ctx.send().await {
            println!("(send failed: {err})");
        }
    }

    client.stop();
    Ok(())
}
