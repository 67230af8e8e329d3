//! Transport Traits
//!
//! The two injectable seams between the session state machine and the outside
//! world:
//! - `EventSource`: opens and closes the stream subscription
//! - `Scheduler`: arms and cancels the reconnect timer
//!
//! Neither trait delivers events itself. Implementations report what happens
//! (connection opened, payload received, error, timer fired) as
//! [`SessionEvent`](crate::events::SessionEvent)s, which the owner feeds back
//! into the session. Tests drive the state machine by constructing those events
//! directly, with no sockets or wall-clock delays.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

/// Identifies one stream connection attempt
///
/// Every `open` returns a fresh id. Events tagged with a superseded id are
/// dropped, so a connection that was replaced can never write into the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identifies one scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Errors reported by a stream connection
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be made or the connection dropped while setting up
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// The server answered with a non-success status
    #[error("Server responded with status {0}")]
    Status(u16),
    /// Reading the body failed mid-stream
    #[error("Stream read failed: {0}")]
    ReadFailed(String),
    /// The server ended the stream
    #[error("Stream closed by server")]
    ClosedByServer,
}

/// A stream subscription the session can open and close
pub trait EventSource {
    /// Open a subscription to `url`, closing any existing one first
    fn open(&mut self, url: &Url) -> ConnectionId;

    /// Close the current subscription; safe to call when nothing is open
    fn close(&mut self);
}

/// A timer facility for reconnect delays
pub trait Scheduler {
    /// Arm a one-shot timer
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Disarm a timer; unknown or already-fired ids are ignored
    fn cancel(&mut self, timer: TimerId);
}

/// Strip the query (which carries the access token) for logging
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
