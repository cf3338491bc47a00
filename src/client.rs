//! TCP client with supervised reconnect.
//!
//! The client owns one background supervisor task. Each pass through
//! the supervisor is one connection generation: connect (with
//! callback-controlled retry), spawn the writer task, run the read loop
//! and the keep-alive loop racing each other, and on whichever fails
//! first tear the generation down and start over. `stop()` aborts the
//! supervisor and everything under it.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::codec::{MsgPackCodec, PayloadCodec};
use crate::dispatch::{BoxFuture, DispatcherBuilder, MessageDispatcher};
use crate::envelope::Envelope;
use crate::error::{ConnectError, CourierError, Result};
use crate::keep_alive::{keep_alive_loop, KeepAliveConfig, LivenessFlag};
use crate::lock;
use crate::output::{OutputBuilder, PendingMessage};
use crate::protocol::{FrameKind, FrameReader, PONG_FRAME};
use crate::uri::parse_tcp_uri;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

type ConnectedFn<C, P> =
    Arc<dyn Fn(Arc<ClientContext<C, P>>) -> BoxFuture<'static, ()> + Send + Sync>;
type DisconnectedFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
type ConnectFailureFn =
    Arc<dyn Fn(ConnectError) -> BoxFuture<'static, Option<Duration>> + Send + Sync>;

/// Per-connection handle given to handlers and the connected callback.
///
/// Valid for one connection generation; after a disconnect its writer
/// is gone and sends fail with [`CourierError::NotConnected`].
pub struct ClientContext<C, P = MsgPackCodec> {
    output: OutputBuilder<C>,
    writer: WriterHandle,
    _codec: PhantomData<fn() -> P>,
}

impl<C: Envelope, P: PayloadCodec> ClientContext<C, P> {
    fn new(writer: WriterHandle) -> Self {
        Self {
            output: OutputBuilder::new(),
            writer,
            _codec: PhantomData,
        }
    }

    /// Start building the named outbound message.
    pub fn begin(&self, variant: &str) -> Result<PendingMessage<'_, C>> {
        self.output.begin(variant)
    }

    /// Encode the pending message and queue it for writing.
    pub async fn send(&self) -> Result<()> {
        let envelope = self.output.take()?;
        let payload = P::encode(&envelope)?;
        let frame = OutboundFrame::user(FrameKind::ClientToServerUser, payload.into())?;
        self.writer.send(frame).await
    }
}

struct ClientShared<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    host: String,
    port: u16,
    connect_timeout: Duration,
    keep_alive: KeepAliveConfig,
    dispatcher: MessageDispatcher<S, ClientContext<C, P>>,
    on_connected: ConnectedFn<C, P>,
    on_disconnected: DisconnectedFn,
    on_connect_failure: ConnectFailureFn,
    current: Mutex<Option<Arc<ClientContext<C, P>>>>,
    /// Set by `stop()` before the supervisor is aborted; checked under
    /// the `current` lock so an in-flight generation cannot publish a
    /// context after `stop()` returns.
    stopped: AtomicBool,
}

/// Configures and creates a [`Client`].
pub struct ClientBuilder<C, S, P = MsgPackCodec>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    uri: String,
    connect_timeout: Duration,
    keep_alive: KeepAliveConfig,
    reconnect_delay: Duration,
    dispatch: DispatcherBuilder<S, ClientContext<C, P>>,
    on_connected: Option<ConnectedFn<C, P>>,
    on_disconnected: Option<DisconnectedFn>,
    on_connect_failure: Option<ConnectFailureFn>,
}

impl<C, S, P> ClientBuilder<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    /// Create a builder targeting `tcp://<host>:<port>`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keep_alive: KeepAliveConfig::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            dispatch: DispatcherBuilder::new(),
            on_connected: None,
            on_disconnected: None,
            on_connect_failure: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Interval between keep-alive probes. The response deadline is
    /// one and a half intervals.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive = KeepAliveConfig::with_interval(interval);
        self
    }

    /// Delay before retrying a failed connect, when no
    /// `on_connect_failure` callback is installed.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Register a handler for the named inbound message variant.
    pub fn handle<F, Fut>(mut self, variant: &str, handler: F) -> Self
    where
        F: Fn(S, Arc<ClientContext<C, P>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatch = self.dispatch.handle(variant, handler);
        self
    }

    /// Called once per established connection, before any inbound
    /// message is dispatched.
    pub fn on_connected<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<ClientContext<C, P>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connected = Some(Arc::new(move |ctx| Box::pin(callback(ctx))));
        self
    }

    /// Called when an established connection is lost, before the next
    /// connect attempt.
    pub fn on_disconnected<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_disconnected = Some(Arc::new(move || Box::pin(callback())));
        self
    }

    /// Called after each failed connect attempt with the classified
    /// failure. Return `Some(delay)` to retry after the delay, `None`
    /// to give up for good.
    pub fn on_connect_failure<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(ConnectError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        self.on_connect_failure = Some(Arc::new(move |err| Box::pin(callback(err))));
        self
    }

    /// Validate the configuration and create the client.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::BadUri`] for a malformed URI and
    /// [`CourierError::UnknownVariant`] for a handler registered on a
    /// variant the inbound envelope does not declare.
    pub fn build(self) -> Result<Client<C, S, P>> {
        let (host, port) = parse_tcp_uri(&self.uri)?;
        let dispatcher = self.dispatch.build()?;

        let reconnect_delay = self.reconnect_delay;
        let shared = Arc::new(ClientShared {
            host,
            port,
            connect_timeout: self.connect_timeout,
            keep_alive: self.keep_alive,
            dispatcher,
            on_connected: self
                .on_connected
                .unwrap_or_else(|| Arc::new(|_| Box::pin(async {}))),
            on_disconnected: self
                .on_disconnected
                .unwrap_or_else(|| Arc::new(|| Box::pin(async {}))),
            on_connect_failure: self.on_connect_failure.unwrap_or_else(|| {
                Arc::new(move |_| Box::pin(async move { Some(reconnect_delay) }))
            }),
            current: Mutex::new(None),
            stopped: AtomicBool::new(false),
        });

        Ok(Client {
            shared,
            task: Mutex::new(None),
        })
    }
}

/// A supervised TCP client.
///
/// `C` is the outbound envelope, `S` the inbound one, `P` the payload
/// codec.
pub struct Client<C, S, P = MsgPackCodec>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    shared: Arc<ClientShared<C, S, P>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C, S, P> Client<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    /// Start the supervisor task. Calling `start` on a running client
    /// does nothing.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.is_some() {
            return;
        }
        info!(host = %self.shared.host, port = self.shared.port, "client starting");
        self.shared.stopped.store(false, Ordering::SeqCst);
        *task = Some(tokio::spawn(supervise(self.shared.clone())));
    }

    /// Stop the supervisor and drop the current connection, if any.
    /// Calling `stop` on a stopped client does nothing.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        lock(&self.shared.current).take();
    }

    /// The context of the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::NotConnected`] while no connection is
    /// established.
    pub fn context(&self) -> Result<Arc<ClientContext<C, P>>> {
        lock(&self.shared.current)
            .clone()
            .ok_or(CourierError::NotConnected)
    }

    /// Encode and queue the pending message on the current connection.
    pub async fn send(&self) -> Result<()> {
        self.context()?.send().await
    }
}

impl<C, S, P> Drop for Client<C, S, P>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    fn drop(&mut self) {
        self.stop();
    }
}

async fn supervise<C, S, P>(shared: Arc<ClientShared<C, S, P>>)
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    loop {
        let Some(stream) = connect_with_retry(&shared).await else {
            info!("giving up on connecting");
            return;
        };
        info!("connected");

        let (read_half, write_half) = stream.into_split();
        let (writer, writer_task) = spawn_writer_task(write_half);

        let ctx = Arc::new(ClientContext::new(writer.clone()));
        {
            let mut current = lock(&shared.current);
            if shared.stopped.load(Ordering::SeqCst) {
                // stop() raced the publish; this generation is dead.
                writer_task.abort();
                return;
            }
            *current = Some(ctx.clone());
        }

        (shared.on_connected)(ctx.clone()).await;

        let pong = LivenessFlag::new();
        let mut reader = FrameReader::new(read_half);

        // Whichever loop fails first wins the race; dropping the other
        // one cancels it, so a generation tears down exactly once.
        let err = tokio::select! {
            err = read_loop::<C, S, P>(&mut reader, &shared, &ctx, &pong, &writer) => err,
            err = keep_alive_loop(shared.keep_alive, writer.clone(), &pong) => err,
        };
        debug!(error = %err, "connection lost");

        lock(&shared.current).take();
        writer_task.abort();
        (shared.on_disconnected)().await;
    }
}

async fn connect_with_retry<C, S, P>(
    shared: &Arc<ClientShared<C, S, P>>,
) -> Option<TcpStream>
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    loop {
        let attempt = tokio::time::timeout(
            shared.connect_timeout,
            TcpStream::connect((shared.host.as_str(), shared.port)),
        )
        .await;

        let failure = match attempt {
            Ok(Ok(stream)) => return Some(stream),
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::ConnectionRefused => {
                ConnectError::Refused
            }
            Ok(Err(err)) => ConnectError::Other(err),
            Err(_) => ConnectError::Timeout,
        };
        debug!(error = %failure, "connect failed");

        match (shared.on_connect_failure)(failure).await {
            Some(delay) => tokio::time::sleep(delay).await,
            None => return None,
        }
    }
}

async fn read_loop<C, S, P>(
    reader: &mut FrameReader<tokio::net::tcp::OwnedReadHalf>,
    shared: &Arc<ClientShared<C, S, P>>,
    ctx: &Arc<ClientContext<C, P>>,
    pong: &LivenessFlag,
    writer: &WriterHandle,
) -> CourierError
where
    C: Envelope,
    S: Envelope,
    P: PayloadCodec,
{
    loop {
        let frame = match reader.next_frame().await {
            Ok(frame) => frame,
            Err(err) => return err,
        };

        match frame.frame_kind() {
            Some(FrameKind::ServerToClientUser) => {
                let envelope: S = match P::decode(frame.payload()) {
                    Ok(envelope) => envelope,
                    Err(err) => return err,
                };
                shared.dispatcher.dispatch(envelope, ctx.clone()).await;
            }
            Some(FrameKind::Pong) => pong.set(),
            Some(FrameKind::Ping) => {
                // Unexpected from a server, but answering is harmless.
                if let Err(err) = writer.send(OutboundFrame::control(PONG_FRAME)).await {
                    return err;
                }
            }
            Some(FrameKind::ClientToServerUser) | None => {
                debug!(kind = frame.kind, "discarding unexpected frame");
            }
        }
    }
}
