//! Chat Session Controller
//!
//! Orchestrates one conversation: user submits, the streamed reply, the
//! connection lifecycle, and the updates a view renders.
//!
//! # Design Philosophy
//!
//! The controller is a synchronous state machine. Every input is either a
//! command (`submit`, `initialize`, `update_auth`, `close`) or a
//! [`SessionEvent`] passed to [`ChatSession::handle_event`]. Each call runs to
//! completion and publishes the resulting [`SessionUpdate`]s before the next
//! input is looked at, so chunk application never interleaves with a submit.
//!
//! ```text
//!            submit()                first chunk
//!   Idle ─────────────► Submitting ─────────────► Receiving
//!    ▲                                              │  │  │
//!    │            [DONE]                            │  │  │
//!    ├──────────────────────────────────────────────┘  │  │
//!    │            [ERROR] (+ notice)                   │  │
//!    ├─────────────────────────────────────────────────┘  │
//!    │            retries exhausted (+ notice)            │
//!    └──────────────────── Failed ◄───────────────────────┘
//! ```
//!
//! Nothing here awaits. The runtime ([`crate::runtime`]) owns the tokio task
//! that feeds events in.

use reqwest::Url;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::backend::{stream_url, Messenger, SendRequest};
use crate::context::{AuthSession, SessionContext};
use crate::events::SessionEvent;
use crate::messages::{ConnectionState, Message, Notice, NoticeKind, SessionUpdate};
use crate::store::MessageStore;
use crate::streaming::{ChunkOutcome, Sentinels, StreamReassembler};
use crate::transport::{EventSource, RetryConfig, RetryController, RetryDecision, Scheduler};

// ============================================================================
// Configuration + Errors
// ============================================================================

/// Tunables for a session
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionConfig {
    /// Reserved stream payloads
    pub sentinels: Sentinels,
    /// Reconnect policy
    pub retry: RetryConfig,
    /// Refuse a submit while a reply is still streaming
    pub reject_overlapping_submits: bool,
}

/// Why a submit was refused
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The text was empty or whitespace only
    #[error("Message is empty")]
    EmptyMessage,
    /// No authenticated session is available
    #[error("Not signed in")]
    NotAuthenticated,
    /// A reply is still streaming and overlapping submits are disabled
    #[error("A reply is still in progress")]
    TurnInProgress,
    /// The session runtime has stopped
    #[error("Session is closed")]
    SessionClosed,
}

// ============================================================================
// Session
// ============================================================================

/// The per-conversation controller
pub struct ChatSession<E: EventSource, S: Scheduler, M: Messenger> {
    /// Conversation and principal
    context: SessionContext,
    /// API base the stream URL is built from
    api_url: Url,
    /// Overlap policy
    reject_overlapping_submits: bool,
    /// The conversation's messages
    store: MessageStore,
    /// Chunk fold and the receiving flag
    reassembler: StreamReassembler,
    /// Stream connection lifecycle
    retry: RetryController<E, S>,
    /// Fire-and-forget sends
    messenger: M,
    /// Observer channel
    updates: mpsc::UnboundedSender<SessionUpdate>,
    /// Last connection state published
    published_state: ConnectionState,
    /// Last receiving flag published
    published_receiving: bool,
}

impl<E: EventSource, S: Scheduler, M: Messenger> ChatSession<E, S, M> {
    /// Create an idle session with an empty store
    pub fn new(
        context: SessionContext,
        api_url: Url,
        config: SessionConfig,
        source: E,
        scheduler: S,
        messenger: M,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> Self {
        Self {
            store: MessageStore::new(context.conversation_id.clone()),
            context,
            api_url,
            reject_overlapping_submits: config.reject_overlapping_submits,
            reassembler: StreamReassembler::new(config.sentinels),
            retry: RetryController::new(source, scheduler, config.retry),
            messenger,
            updates,
            published_state: ConnectionState::Closed,
            published_receiving: false,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Whether a reply is expected; views gate input on this
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.reassembler.is_receiving()
    }

    /// The message list
    #[must_use]
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Stream connection state
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.retry.state()
    }

    /// Consecutive stream errors since the last successful open
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry.retry_count()
    }

    /// Conversation and principal
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Seed the store with server history (view mount)
    ///
    /// With `new_conversation` set, the first reply is already being generated,
    /// so an empty placeholder is appended and input is gated.
    pub fn initialize(&mut self, server_messages: Vec<Message>, new_conversation: bool) {
        self.store.seed(server_messages);
        self.publish(SessionUpdate::Reset {
            messages: self.store.messages().to_vec(),
        });

        self.set_receiving(false);
        if new_conversation {
            let placeholder =
                Message::placeholder(self.store.conversation_id().clone(), self.context.user_id());
            self.append(placeholder);
            self.set_receiving(true);
        }

        tracing::info!(
            conversation_id = %self.context.conversation_id,
            messages = self.store.len(),
            new_conversation,
            "Session initialized"
        );

        if let Some(url) = self.stream_url() {
            self.retry.open(url);
        }
        self.sync_connection();
    }

    /// Submit user text
    ///
    /// Appends the user message and an empty assistant placeholder, hands the
    /// send to the messenger, and makes sure the stream is open.
    pub fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring empty submit");
            return Err(SubmitError::EmptyMessage);
        }

        let Some(auth) = self.context.auth.clone() else {
            tracing::warn!(
                conversation_id = %self.context.conversation_id,
                "Submit without an authenticated session"
            );
            self.publish(SessionUpdate::Notice(Notice::new(NoticeKind::NotAuthenticated)));
            return Err(SubmitError::NotAuthenticated);
        };

        if self.reject_overlapping_submits && self.is_receiving() {
            return Err(SubmitError::TurnInProgress);
        }

        self.set_receiving(true);

        self.messenger.send(SendRequest {
            token: auth.access_token,
            conversation_id: self.context.conversation_id.clone(),
            message: text.to_string(),
        });

        let conversation_id = self.store.conversation_id().clone();
        self.append(Message::user(conversation_id.clone(), auth.user_id.clone(), text));
        self.append(Message::placeholder(conversation_id, auth.user_id));

        tracing::debug!(
            conversation_id = %self.context.conversation_id,
            messages = self.store.len(),
            "Message submitted"
        );

        if let Some(url) = self.stream_url() {
            self.retry.ensure_open(url);
        }
        self.sync_connection();
        Ok(())
    }

    /// Replace the principal (sign-in, token refresh, sign-out)
    ///
    /// Signing in opens the stream, or reopens it with the new credential if
    /// one is already active. Removing auth tears the stream down.
    pub fn update_auth(&mut self, auth: Option<AuthSession>) {
        let signed_in = auth.is_some();
        self.context.auth = auth;

        if signed_in {
            if let Some(url) = self.stream_url() {
                if self.retry.is_active() {
                    tracing::info!(
                        conversation_id = %self.context.conversation_id,
                        "Credentials changed, reopening stream"
                    );
                } else {
                    tracing::info!(
                        conversation_id = %self.context.conversation_id,
                        "Signed in, opening stream"
                    );
                }
                self.retry.open(url);
            }
            self.sync_connection();
        } else {
            tracing::info!(
                conversation_id = %self.context.conversation_id,
                "Signed out, closing stream"
            );
            self.close();
        }
    }

    /// Tear down (view unmount)
    ///
    /// Partial assistant text is kept as-is. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.retry.close();
        self.sync_connection();
        self.end_turn();
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Apply one inbound event
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StreamOpened { connection } => {
                if self.retry.on_open(connection) {
                    tracing::debug!(connection = %connection, "Event stream open");
                    self.sync_connection();
                }
            }
            SessionEvent::StreamPayload { connection, data } => {
                if !self.retry.is_current(connection) {
                    tracing::trace!(connection = %connection, "Dropping payload from superseded stream");
                    return;
                }
                self.apply_payload(&data);
            }
            SessionEvent::StreamError { connection, error } => {
                match self.retry.on_error(connection, &error) {
                    RetryDecision::Stale => {}
                    RetryDecision::Rescheduled { .. } => self.sync_connection(),
                    RetryDecision::Failed => {
                        self.sync_connection();
                        self.publish(SessionUpdate::Notice(Notice::new(
                            NoticeKind::StaleConnection,
                        )));
                        self.end_turn();
                    }
                }
            }
            SessionEvent::RetryTimerFired { timer } => {
                if self.retry.on_timer(timer) {
                    self.sync_connection();
                }
            }
            SessionEvent::SendFailed { error } => {
                tracing::warn!(
                    conversation_id = %self.context.conversation_id,
                    error = %error,
                    "Message send failed"
                );
                self.publish(SessionUpdate::Notice(Notice::new(NoticeKind::SendFailed)));
                self.end_turn();
            }
        }
    }

    fn apply_payload(&mut self, data: &str) {
        let was_open = self.store.open_index();
        let owner = self.context.user_id();

        match self.reassembler.apply(&mut self.store, data, &owner) {
            ChunkOutcome::Appended {
                index,
                placeholder_created,
                text,
            } => {
                if let Some(previous) = was_open.filter(|&i| i != index) {
                    self.publish(SessionUpdate::TurnEnded { index: previous });
                }
                if placeholder_created {
                    if let Some(message) = self.store.get(index).cloned() {
                        self.publish(SessionUpdate::Appended { index, message });
                    }
                } else {
                    self.publish(SessionUpdate::Delta { index, text });
                }
                self.sync_receiving();
            }
            ChunkOutcome::TurnEnded { index } => {
                if let Some(index) = index {
                    self.publish(SessionUpdate::TurnEnded { index });
                }
                tracing::debug!(
                    conversation_id = %self.context.conversation_id,
                    "Reply complete"
                );
                self.sync_receiving();
            }
            ChunkOutcome::TurnFailed { index } => {
                if let Some(index) = index {
                    self.publish(SessionUpdate::TurnEnded { index });
                }
                tracing::warn!(
                    conversation_id = %self.context.conversation_id,
                    "Backend reported a generation failure"
                );
                self.publish(SessionUpdate::Notice(Notice::new(NoticeKind::GenerationFailed)));
                self.sync_receiving();
            }
            ChunkOutcome::Ignored => {}
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn append(&mut self, message: Message) {
        let was_open = self.store.open_index();
        let index = self.store.append(message);
        if let Some(previous) = was_open.filter(|&i| Some(i) != self.store.open_index()) {
            self.publish(SessionUpdate::TurnEnded { index: previous });
        }
        if let Some(message) = self.store.get(index).cloned() {
            self.publish(SessionUpdate::Appended { index, message });
        }
    }

    /// Close the open placeholder and release the input gate
    fn end_turn(&mut self) {
        if let Some(index) = self.store.complete_open() {
            self.publish(SessionUpdate::TurnEnded { index });
        }
        self.set_receiving(false);
    }

    fn set_receiving(&mut self, receiving: bool) {
        if receiving {
            self.reassembler.begin_turn();
        } else {
            self.reassembler.abort_turn();
        }
        self.sync_receiving();
    }

    /// Publish the receiving flag if it changed since the last publish
    fn sync_receiving(&mut self) {
        let receiving = self.reassembler.is_receiving();
        if receiving != self.published_receiving {
            self.published_receiving = receiving;
            self.publish(SessionUpdate::Receiving(receiving));
        }
    }

    fn sync_connection(&mut self) {
        let state = self.retry.state();
        if state != self.published_state {
            self.published_state = state;
            self.publish(SessionUpdate::Connection(state));
        }
    }

    fn stream_url(&self) -> Option<Url> {
        let auth = self.context.auth.as_ref()?;
        match stream_url(&self.api_url, &self.context.conversation_id, &auth.access_token) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::error!(error = %e, "Cannot build event stream URL");
                None
            }
        }
    }

    fn publish(&self, update: SessionUpdate) {
        // A closed channel means the view is gone; the session keeps its state
        let _ = self.updates.send(update);
    }
}
