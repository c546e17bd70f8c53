//! Transport collaborators: the streaming (push) connection and the
//! request/response (pull) client, both consumed through narrow interfaces.

pub mod rest;
pub mod ws;

use std::os::fd::RawFd;

use crate::error::Error;

/// A subscription on the push transport, parameterized by the active
/// coin/interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    L2Book { coin: String },
    Trades { coin: String },
    Candle { coin: String, interval: String },
    ActiveAssetCtx { coin: String },
}

impl Subscription {
    /// The wire-level subscribe request for this subscription.
    pub fn request(&self) -> serde_json::Value {
        let sub = match self {
            Subscription::L2Book { coin } => serde_json::json!({
                "type": "l2Book", "coin": coin,
            }),
            Subscription::Trades { coin } => serde_json::json!({
                "type": "trades", "coin": coin,
            }),
            Subscription::Candle { coin, interval } => serde_json::json!({
                "type": "candle", "coin": coin, "interval": interval,
            }),
            Subscription::ActiveAssetCtx { coin } => serde_json::json!({
                "type": "activeAssetCtx", "coin": coin,
            }),
        };
        serde_json::json!({ "method": "subscribe", "subscription": sub })
    }
}

/// One receive outcome from a push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// A text payload to decode.
    Message(String),
    /// The read timed out (or a non-data frame arrived); poll again.
    Timeout,
    /// The peer closed the connection.
    Closed,
}

/// Factory for push connections. The streaming worker is generic over this
/// so tests can drive it with a local TCP fake.
pub trait PushTransport {
    type Conn: PushConn;

    fn connect(&self) -> Result<Self::Conn, Error>;
}

/// A live push connection.
pub trait PushConn {
    fn subscribe(&mut self, sub: &Subscription) -> Result<(), Error>;

    /// Blocking receive, bounded by the connection's read timeout.
    fn next(&mut self) -> Result<FeedEvent, Error>;

    /// The underlying socket descriptor, exposed so cancellation can close
    /// the connection out from under a blocked receive.
    fn raw_fd(&self) -> RawFd;

    /// Keepalive; implementations without one ignore it.
    fn ping(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn close(self);
}

/// Forcibly shut down both halves of a socket from another thread.
///
/// This is the cancellation primitive: the owning worker's blocked read
/// returns an error, which its state machine treats as "re-resolve config",
/// not as a fatal condition. Safe on any fd; errors (already closed, not a
/// socket) are intentionally ignored.
pub fn shutdown_fd(fd: RawFd) {
    if fd < 0 {
        return;
    }
    unsafe {
        libc::shutdown(fd, libc::SHUT_RDWR);
    }
}
