//! Server integration tests against raw-socket clients.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier::server::{Server, ServerBuilder};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use common::{decode, encode, read_raw_frame, write_raw_frame, ClientToServer, ServerToClient};

const PING_FRAME: [u8; 4] = [0x03, 0x00, 0x00, 0x00];
const PONG_FRAME: [u8; 4] = [0x04, 0x00, 0x00, 0x00];

async fn start_echo_server() -> Server<ClientToServer, ServerToClient> {
    let server = ServerBuilder::<ClientToServer, ServerToClient>::new("tcp://127.0.0.1:0")
        .handle("connect_req", |_msg, ctx| async move {
            ctx.begin("connect_rsp").unwrap();
            ctx.reply().await.unwrap();
        })
        .handle("message_ind", |msg, ctx| async move {
            if let ClientToServer::MessageInd { user, text } = msg {
                {
                    let mut ind = ctx.begin("message_ind").unwrap();
                    if let ServerToClient::MessageInd {
                        user: out_user,
                        text: out_text,
                    } = &mut *ind
                    {
                        *out_user = user;
                        *out_text = text;
                    }
                }
                ctx.broadcast().await.unwrap();
            }
        })
        .build()
        .unwrap();
    server.start().await.unwrap();
    server
}

#[tokio::test]
async fn answers_ping_with_pong() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut client, &PING_FRAME)
        .await
        .unwrap();

    let mut reply = [0u8; 4];
    timeout(Duration::from_secs(5), client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, PONG_FRAME);

    server.stop();
}

#[tokio::test]
async fn replies_to_the_sending_client() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    write_raw_frame(
        &mut client,
        1,
        &encode(&ClientToServer::ConnectReq {
            user: "Erik".to_string(),
        }),
    )
    .await;

    let (kind, payload) = timeout(Duration::from_secs(5), read_raw_frame(&mut client))
        .await
        .unwrap();
    assert_eq!(kind, 2);
    assert_eq!(decode::<ServerToClient>(&payload), ServerToClient::ConnectRsp);

    server.stop();
}

#[tokio::test]
async fn broadcasts_to_every_connected_client() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let mut sender = TcpStream::connect(addr).await.unwrap();
    let mut observer = TcpStream::connect(addr).await.unwrap();

    // Both serve loops must be registered before the broadcast goes out.
    timeout(Duration::from_secs(5), async {
        while server.client_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    write_raw_frame(
        &mut sender,
        1,
        &encode(&ClientToServer::MessageInd {
            user: "Erik".to_string(),
            text: "hello everyone".to_string(),
        }),
    )
    .await;

    for client in [&mut sender, &mut observer] {
        let (kind, payload) = timeout(Duration::from_secs(5), read_raw_frame(client))
            .await
            .unwrap();
        assert_eq!(kind, 2);
        assert_eq!(
            decode::<ServerToClient>(&payload),
            ServerToClient::MessageInd {
                user: "Erik".to_string(),
                text: "hello everyone".to_string(),
            }
        );
    }

    server.stop();
}

#[tokio::test]
async fn drops_client_that_misses_its_deadline() {
    let disconnected = Arc::new(AtomicU32::new(0));

    let server = ServerBuilder::<ClientToServer, ServerToClient>::new("tcp://127.0.0.1:0")
        .client_deadline(Duration::from_millis(100))
        .on_client_disconnected({
            let disconnected = disconnected.clone();
            move |_peer| {
                let disconnected = disconnected.clone();
                async move {
                    disconnected.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .build()
        .unwrap();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();

    // A silent client is dropped; its socket reads EOF.
    let mut buf = [0u8; 1];
    let n = timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(server.client_count(), 0);

    server.stop();
}

#[tokio::test]
async fn pinging_client_outlives_its_deadline() {
    let server = ServerBuilder::<ClientToServer, ServerToClient>::new("tcp://127.0.0.1:0")
        .client_deadline(Duration::from_millis(100))
        .build()
        .unwrap();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();

    // Ping well inside the deadline a few times; each one must be
    // answered and push the deadline out.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::io::AsyncWriteExt::write_all(&mut client, &PING_FRAME)
            .await
            .unwrap();
        let (kind, _) = timeout(Duration::from_secs(5), read_raw_frame(&mut client))
            .await
            .unwrap();
        assert_eq!(kind, 4);
    }
    assert_eq!(server.client_count(), 1);

    server.stop();
}

#[tokio::test]
async fn concurrent_starts_bind_once() {
    // Pick a free fixed port; a second bind on it would fail.
    let port = {
        let probe_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe_listener.local_addr().unwrap().port()
    };

    // The hostname form forces a resolution await inside bind, which
    // is where overlapping starts used to slip past each other.
    let server = ServerBuilder::<ClientToServer, ServerToClient>::new(format!(
        "tcp://localhost:{port}"
    ))
    .build()
    .unwrap();

    let (first, second) = tokio::join!(server.start(), server.start());
    first.unwrap();
    second.unwrap();

    let mut client = TcpStream::connect(("localhost", port)).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut client, &PING_FRAME)
        .await
        .unwrap();
    let mut reply = [0u8; 4];
    timeout(Duration::from_secs(5), client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, PONG_FRAME);

    server.stop();

    // The one listener is gone; nothing stays behind accepting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(("localhost", port)).await.is_err());
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let server = ServerBuilder::<ClientToServer, ServerToClient>::new("tcp://127.0.0.1:0")
        .build()
        .unwrap();

    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();
    server.start().await.unwrap();
    assert_eq!(server.local_addr().unwrap(), addr);

    server.stop();
    server.stop();
    assert!(server.local_addr().is_err());
}
