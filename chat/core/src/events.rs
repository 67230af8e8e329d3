//! Session Events
//!
//! Everything that can happen to a session from the outside, as one enum.
//! Stream callbacks, timer expiry and send failures are all delivered as
//! `SessionEvent`s and applied one at a time by
//! [`ChatSession::handle_event`](crate::session::ChatSession::handle_event),
//! so no two mutations of the store ever interleave.

use crate::transport::{ConnectionId, TimerId, TransportError};

/// An input to the session state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The stream connection is established
    StreamOpened {
        /// Which connection
        connection: ConnectionId,
    },
    /// A `message` event arrived on the stream
    StreamPayload {
        /// Which connection
        connection: ConnectionId,
        /// Raw event data
        data: String,
    },
    /// The stream failed or was closed by the server
    StreamError {
        /// Which connection
        connection: ConnectionId,
        /// What went wrong
        error: TransportError,
    },
    /// A reconnect timer expired
    RetryTimerFired {
        /// Which timer
        timer: TimerId,
    },
    /// The fire-and-forget send of a user message failed
    SendFailed {
        /// Description of the failure, for logging
        error: String,
    },
}
