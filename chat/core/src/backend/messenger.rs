//! Backend Messenger
//!
//! [`Messenger`] that spawns each send on the runtime and reports failures
//! back into the session's event channel.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::traits::{ChatBackend, Messenger, SendRequest};
use crate::events::SessionEvent;

/// Sends user messages through a [`ChatBackend`] without blocking the session
pub struct BackendMessenger<B: ChatBackend + 'static> {
    /// Backend to send through
    backend: Arc<B>,
    /// Where failures are reported
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<B: ChatBackend + 'static> BackendMessenger<B> {
    /// Create a messenger reporting into `events`
    pub fn new(backend: Arc<B>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { backend, events }
    }
}

impl<B: ChatBackend + 'static> Messenger for BackendMessenger<B> {
    fn send(&mut self, request: SendRequest) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = backend
                .send_message(&request.token, &request.conversation_id, &request.message)
                .await;
            if let Err(e) = result {
                tracing::warn!(
                    conversation_id = %request.conversation_id,
                    error = %e,
                    "Failed to send message"
                );
                let _ = events.send(SessionEvent::SendFailed {
                    error: e.to_string(),
                });
            }
        });
    }
}
