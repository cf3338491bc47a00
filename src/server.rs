//! TCP server.
//!
//! Accepts clients and runs one task per connection. The server side
//! never probes; it answers each client Ping with a Pong and drops
//! clients whose Pings stop arriving before the keep-alive deadline.
//! Handlers reply to the sending client or broadcast to every
//! connected one through a [`ReplyContext`].

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use crate::codec::{MsgPackCodec, PayloadCodec};
use crate::dispatch::{BoxFuture, DispatcherBuilder, MessageDispatcher};
use crate::envelope::Envelope;
use crate::error::{CourierError, Result};
use crate::lock;
use crate::output::{OutputBuilder, PendingMessage};
use crate::protocol::{FrameKind, FrameReader, PONG_FRAME};
use crate::uri::parse_tcp_uri;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Time a client has to send its next Ping before it is dropped.
pub const DEFAULT_CLIENT_DEADLINE: Duration = Duration::from_secs(3);

type ClientConnectedFn<S, P> =
    Arc<dyn Fn(Arc<ReplyContext<S, P>>) -> BoxFuture<'static, ()> + Send + Sync>;
type ClientDisconnectedFn =
    Arc<dyn Fn(SocketAddr) -> BoxFuture<'static, ()> + Send + Sync>;

type ClientMap = Mutex<HashMap<u64, WriterHandle>>;

/// Per-client handle given to handlers and the connected callback.
pub struct ReplyContext<S, P = MsgPackCodec> {
    id: u64,
    peer: SocketAddr,
    output: OutputBuilder<S>,
    writer: WriterHandle,
    clients: Arc<ClientMap>,
    _codec: PhantomData<fn() -> P>,
}

impl<S: Envelope, P: PayloadCodec> ReplyContext<S, P> {
    /// Address of the client this context belongs to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Start building the named outbound message.
    pub fn begin(&self, variant: &str) -> Result<PendingMessage<'_, S>> {
        self.output.begin(variant)
    }

    /// Encode the pending message and queue it for this client.
    pub async fn reply(&self) -> Result<()> {
        let frame = self.encode_pending()?;
        self.writer.send(frame).await
    }

    /// Encode the pending message and queue it for every connected
    /// client, including this one.
    ///
    /// Clients whose writer has already stopped are skipped; the
    /// deadline reaper removes them.
    pub async fn broadcast(&self) -> Result<()> {
        let frame = self.encode_pending()?;
        let writers: Vec<WriterHandle> = lock(&self.clients).values().cloned().collect();
        for writer in writers {
            let _ = writer.send(frame.clone()).await;
        }
        Ok(())
    }

    fn encode_pending(&self) -> Result<OutboundFrame> {
        let envelope = self.output.take()?;
        let payload = P::encode(&envelope)?;
        OutboundFrame::user(FrameKind::ServerToClientUser, payload.into())
    }
}

struct ServerShared<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    host: String,
    port: u16,
    client_deadline: Duration,
    dispatcher: MessageDispatcher<C, ReplyContext<S, P>>,
    on_client_connected: ClientConnectedFn<S, P>,
    on_client_disconnected: ClientDisconnectedFn,
    clients: Arc<ClientMap>,
    next_id: AtomicU64,
}

/// Configures and creates a [`Server`].
pub struct ServerBuilder<C, S, P = MsgPackCodec>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    uri: String,
    client_deadline: Duration,
    dispatch: DispatcherBuilder<C, ReplyContext<S, P>>,
    on_client_connected: Option<ClientConnectedFn<S, P>>,
    on_client_disconnected: Option<ClientDisconnectedFn>,
}

impl<C, S, P> ServerBuilder<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    /// Create a builder listening on `tcp://<host>:<port>`. An empty
    /// host binds all addresses; port 0 picks a free port.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            client_deadline: DEFAULT_CLIENT_DEADLINE,
            dispatch: DispatcherBuilder::new(),
            on_client_connected: None,
            on_client_disconnected: None,
        }
    }

    /// Time a client has to Ping before it is dropped.
    pub fn client_deadline(mut self, deadline: Duration) -> Self {
        self.client_deadline = deadline;
        self
    }

    /// Register a handler for the named inbound message variant.
    pub fn handle<F, Fut>(mut self, variant: &str, handler: F) -> Self
    where
        F: Fn(C, Arc<ReplyContext<S, P>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatch = self.dispatch.handle(variant, handler);
        self
    }

    /// Called once per accepted client.
    pub fn on_client_connected<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<ReplyContext<S, P>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_client_connected = Some(Arc::new(move |ctx| Box::pin(callback(ctx))));
        self
    }

    /// Called when a client disconnects or is dropped for missing its
    /// keep-alive deadline.
    pub fn on_client_disconnected<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_client_disconnected = Some(Arc::new(move |peer| Box::pin(callback(peer))));
        self
    }

    /// Validate the configuration and create the server.
    pub fn build(self) -> Result<Server<C, S, P>> {
        let (host, port) = parse_tcp_uri(&self.uri)?;
        let dispatcher = self.dispatch.build()?;

        let shared = Arc::new(ServerShared {
            host,
            port,
            client_deadline: self.client_deadline,
            dispatcher,
            on_client_connected: self
                .on_client_connected
                .unwrap_or_else(|| Arc::new(|_| Box::pin(async {}))),
            on_client_disconnected: self
                .on_client_disconnected
                .unwrap_or_else(|| Arc::new(|_| Box::pin(async {}))),
            clients: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        });

        Ok(Server {
            shared,
            state: Mutex::new(ServerState::Stopped),
        })
    }
}

struct ServerRuntime {
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
    client_tasks: Arc<Mutex<JoinSet<()>>>,
}

/// `Starting` reserves the slot while `start()` is between its
/// is-running check and storing the runtime, so a concurrent `start()`
/// cannot bind a second listener and a concurrent `stop()` is not
/// lost.
enum ServerState {
    Stopped,
    Starting,
    Running(ServerRuntime),
}

/// A listening server.
///
/// `C` is the inbound envelope, `S` the outbound one, `P` the payload
/// codec.
pub struct Server<C, S, P = MsgPackCodec>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    shared: Arc<ServerShared<C, S, P>>,
    state: Mutex<ServerState>,
}

impl<C, S, P> Server<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    /// Bind the listener and start accepting clients. Calling `start`
    /// on a running server does nothing.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            match &*state {
                ServerState::Stopped => *state = ServerState::Starting,
                ServerState::Starting | ServerState::Running(_) => return Ok(()),
            }
        }

        let listener =
            match TcpListener::bind((self.shared.host.as_str(), self.shared.port)).await {
                Ok(listener) => listener,
                Err(err) => {
                    *lock(&self.state) = ServerState::Stopped;
                    return Err(err.into());
                }
            };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(err) => {
                *lock(&self.state) = ServerState::Stopped;
                return Err(err.into());
            }
        };
        info!(%local_addr, "server listening");

        let client_tasks = Arc::new(Mutex::new(JoinSet::new()));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.shared.clone(),
            client_tasks.clone(),
        ));
        let runtime = ServerRuntime {
            accept_task,
            local_addr,
            client_tasks,
        };

        let mut state = lock(&self.state);
        if matches!(*state, ServerState::Starting) {
            *state = ServerState::Running(runtime);
        } else {
            // stop() was called while we were binding.
            runtime.accept_task.abort();
        }
        Ok(())
    }

    /// Stop accepting and drop every connected client. Calling `stop`
    /// on a stopped server does nothing.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), ServerState::Stopped);
        if let ServerState::Running(runtime) = previous {
            runtime.accept_task.abort();
            lock(&runtime.client_tasks).abort_all();
            lock(&self.shared.clients).clear();
        }
    }

    /// The bound address, once started. Useful with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &*lock(&self.state) {
            ServerState::Running(runtime) => Ok(runtime.local_addr),
            _ => Err(CourierError::NotConnected),
        }
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        lock(&self.shared.clients).len()
    }
}

impl<C, S, P> Drop for Server<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop<C, S, P>(
    listener: TcpListener,
    shared: Arc<ServerShared<C, S, P>>,
    client_tasks: Arc<Mutex<JoinSet<()>>>,
) where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "client accepted");
                let shared = shared.clone();
                lock(&client_tasks).spawn(serve_client(stream, peer, shared));
            }
            Err(err) => {
                // EMFILE and friends can persist; do not spin.
                debug!(error = %err, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn serve_client<C, S, P>(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<ServerShared<C, S, P>>,
) where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    let (read_half, write_half) = stream.into_split();
    let (writer, writer_task) = spawn_writer_task(write_half);
    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);

    let ctx = Arc::new(ReplyContext {
        id,
        peer,
        output: OutputBuilder::new(),
        writer: writer.clone(),
        clients: shared.clients.clone(),
        _codec: PhantomData,
    });
    lock(&shared.clients).insert(id, writer.clone());

    (shared.on_client_connected)(ctx.clone()).await;

    let mut reader = FrameReader::new(read_half);
    let mut deadline = tokio::time::Instant::now() + shared.client_deadline;

    loop {
        let frame = tokio::select! {
            frame = reader.next_frame() => match frame {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(%peer, error = %err, "client read failed");
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline) => {
                debug!(%peer, "client missed keep-alive deadline");
                break;
            }
        };

        match frame.frame_kind() {
            Some(FrameKind::Ping) => {
                deadline = tokio::time::Instant::now() + shared.client_deadline;
                if writer.send(OutboundFrame::control(PONG_FRAME)).await.is_err() {
                    break;
                }
            }
            Some(FrameKind::ClientToServerUser) => {
                let envelope: C = match P::decode(frame.payload()) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        debug!(%peer, error = %err, "client payload decode failed");
                        break;
                    }
                };
                shared.dispatcher.dispatch(envelope, ctx.clone()).await;
            }
            Some(FrameKind::Pong) | Some(FrameKind::ServerToClientUser) | None => {
                debug!(%peer, kind = frame.kind, "discarding unexpected frame");
            }
        }
    }

    lock(&shared.clients).remove(&ctx.id);
    writer_task.abort();
    (shared.on_client_disconnected)(peer).await;
}
