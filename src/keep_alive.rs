//! Client-side keep-alive.
//!
//! Once connected, the client periodically probes the peer with a Ping
//! and expects a Pong back before a deadline. The read loop records
//! Pong arrivals on a shared [`LivenessFlag`]; the keep-alive loop
//! clears the flag, sends the probe, and waits. A missed deadline
//! terminates the connection so the supervisor can reconnect.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::error::CourierError;
use crate::lock;
use crate::protocol::wire::PING_FRAME;
use crate::writer::{OutboundFrame, WriterHandle};

/// Default interval between Ping probes.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(2);

/// Keep-alive timing.
///
/// The response deadline is derived from the interval: one and a half
/// intervals, so a single delayed Pong does not kill the connection but
/// two consecutive probe periods never overlap their waits.
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl KeepAliveConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            deadline: interval + interval / 2,
        }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self::with_interval(DEFAULT_KEEP_ALIVE_INTERVAL)
    }
}

/// Edge-triggered flag set by the read loop when a Pong arrives.
#[derive(Default)]
pub struct LivenessFlag {
    seen: Mutex<bool>,
    notify: Notify,
}

impl LivenessFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Pong arrival and wake any waiter.
    pub fn set(&self) {
        *lock(&self.seen) = true;
        self.notify.notify_waiters();
    }

    /// Forget any previously recorded Pong. Called right before each
    /// probe so a stale Pong cannot satisfy the new one.
    pub fn clear(&self) {
        *lock(&self.seen) = false;
    }

    /// Wait until a Pong has been recorded.
    pub async fn wait(&self) {
        loop {
            // Register before checking so a `set` between the check and
            // the await is not lost.
            let notified = self.notify.notified();
            if *lock(&self.seen) {
                return;
            }
            notified.await;
        }
    }
}

/// Run keep-alive probing for one connection.
///
/// Returns only on failure. The caller races this against the read loop
/// with `select!`; whichever side fails first tears the connection
/// down.
pub async fn keep_alive_loop(
    config: KeepAliveConfig,
    writer: WriterHandle,
    pong: &LivenessFlag,
) -> CourierError {
    loop {
        tokio::time::sleep(config.interval).await;

        pong.clear();
        if let Err(err) = writer.send(OutboundFrame::control(PING_FRAME)).await {
            return err;
        }
        trace!("ping sent");

        match tokio::time::timeout(config.deadline, pong.wait()).await {
            Ok(()) => trace!("pong received"),
            Err(_) => {
                debug!("no pong within deadline");
                return CourierError::KeepAliveTimeout;
            }
        }
    }
}
