//! HTTP Event Source
//!
//! [`EventSource`] over a long-lived `GET` with `Accept: text/event-stream`.
//! Each `open` spawns a reader task that decodes the body with
//! [`SseDecoder`] and forwards what it sees as [`SessionEvent`]s tagged with
//! the connection id. `close` aborts the task; anything it had already queued
//! carries a superseded id and is dropped by the session.
//!
//! The last event id the server sent survives reconnects and is replayed in
//! the `Last-Event-ID` header, as a browser `EventSource` does.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{redact_url, ConnectionId, EventSource, TransportError};
use crate::events::SessionEvent;
use crate::streaming::SseDecoder;

/// Header carrying the resume point on reconnect
const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Stream subscription backed by reqwest
pub struct HttpEventSource {
    /// Client used for stream requests; must not carry a total request timeout
    client: reqwest::Client,
    /// Where connection events go
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Last issued connection id
    next_id: u64,
    /// Reader task of the live connection
    reader: Option<JoinHandle<()>>,
    /// Last event id seen on any connection
    last_event_id: Arc<Mutex<Option<String>>>,
}

impl HttpEventSource {
    /// Create a source that reports into `events`
    pub fn new(client: reqwest::Client, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            client,
            events,
            next_id: 0,
            reader: None,
            last_event_id: Arc::new(Mutex::new(None)),
        }
    }

    /// Last event id the server sent, replayed on the next open
    #[must_use]
    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id.lock().clone()
    }

    /// Whether a reader task is running
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl EventSource for HttpEventSource {
    fn open(&mut self, url: &Url) -> ConnectionId {
        self.close();

        self.next_id += 1;
        let connection = ConnectionId(self.next_id);
        let resume = self.last_event_id();
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(ref id) = resume {
            request = request.header(LAST_EVENT_ID, id.as_str());
        }
        let events = self.events.clone();
        let last_event_id = Arc::clone(&self.last_event_id);
        let shown = redact_url(url);

        self.reader = Some(tokio::spawn(async move {
            let error = read_stream(connection, request, resume, &last_event_id, &events).await;
            tracing::debug!(connection = %connection, url = %shown, error = %error, "Event stream ended");
            let _ = events.send(SessionEvent::StreamError { connection, error });
        }));

        connection
    }

    fn close(&mut self) {
        if let Some(task) = self.reader.take() {
            task.abort();
        }
    }
}

impl Drop for HttpEventSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run one connection to completion; returns why it ended
///
/// A clean end of body is reported as [`TransportError::ClosedByServer`]:
/// the subscription is expected to stay open for the life of the session.
async fn read_stream(
    connection: ConnectionId,
    request: reqwest::RequestBuilder,
    resume: Option<String>,
    last_event_id: &Mutex<Option<String>>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> TransportError {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return TransportError::ConnectionFailed(e.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        return TransportError::Status(status.as_u16());
    }

    if events.send(SessionEvent::StreamOpened { connection }).is_err() {
        return TransportError::ClosedByServer;
    }

    let mut decoder = SseDecoder::new();
    decoder.resume_from(resume);
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => return TransportError::ReadFailed(e.to_string()),
        };

        let decoded = match decoder.feed(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => return TransportError::ReadFailed(e.to_string()),
        };

        for event in decoded {
            if event.id.is_some() {
                last_event_id.lock().clone_from(&event.id);
            }
            if !event.is_message() {
                tracing::trace!(connection = %connection, event = %event.event, "Skipping named event");
                continue;
            }
            let payload = SessionEvent::StreamPayload {
                connection,
                data: event.data,
            };
            if events.send(payload).is_err() {
                // Session is gone
                return TransportError::ClosedByServer;
            }
        }
    }

    TransportError::ClosedByServer
}
