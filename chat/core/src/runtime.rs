//! Session Runtime
//!
//! Runs a [`ChatSession`] on one tokio task.
//!
//! ```text
//!   SessionHandle ──commands──┐
//!                             ▼
//!   HttpEventSource ──┐   ┌────────────────┐
//!   TokioScheduler ───┼──►│ select! loop   │──► SessionUpdate channel ──► view
//!   BackendMessenger ─┘   │ (ChatSession)  │
//!       (SessionEvent)    └────────────────┘
//! ```
//!
//! Commands from the view and events from the transport are serialized
//! through `tokio::select!`, so the session is only ever touched by this task
//! and needs no locks.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backend::{BackendError, BackendMessenger, ChatBackend, Messenger};
use crate::context::{AuthSession, SessionContext};
use crate::events::SessionEvent;
use crate::messages::SessionUpdate;
use crate::session::{ChatSession, SessionConfig, SubmitError};
use crate::store::MessageStore;
use crate::transport::{EventSource, HttpEventSource, Scheduler, TokioScheduler};

/// A command from the view
#[derive(Debug)]
pub enum SessionCommand {
    /// Submit user text
    Submit {
        /// Text to send
        text: String,
        /// Where the outcome goes
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    /// Replace the principal
    UpdateAuth(Option<AuthSession>),
    /// Tear down and stop the runtime
    Close,
}

/// View-side handle to a running session
pub struct SessionHandle {
    /// Command channel into the runtime
    commands: mpsc::UnboundedSender<SessionCommand>,
    /// The runtime task; yields the final store
    task: JoinHandle<MessageStore>,
}

impl SessionHandle {
    /// Submit user text and wait for it to be accepted or refused
    ///
    /// # Errors
    ///
    /// Returns the session's [`SubmitError`], or
    /// [`SubmitError::SessionClosed`] if the runtime has stopped.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SubmitError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(SessionCommand::Submit {
                text: text.into(),
                reply,
            })
            .map_err(|_| SubmitError::SessionClosed)?;
        outcome.await.map_err(|_| SubmitError::SessionClosed)?
    }

    /// Replace the principal; returns false if the runtime has stopped
    pub fn update_auth(&self, auth: Option<AuthSession>) -> bool {
        self.commands.send(SessionCommand::UpdateAuth(auth)).is_ok()
    }

    /// Close the session and wait for the runtime to stop
    ///
    /// Returns the final message list, or `None` if the task panicked.
    pub async fn close(self) -> Option<MessageStore> {
        let _ = self.commands.send(SessionCommand::Close);
        match self.task.await {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::error!(error = %e, "Session runtime task failed");
                None
            }
        }
    }
}

/// The event loop around one session
pub struct SessionRuntime<E: EventSource, S: Scheduler, M: Messenger> {
    /// The state machine
    session: ChatSession<E, S, M>,
    /// Transport, timer and send events
    events: mpsc::UnboundedReceiver<SessionEvent>,
    /// View commands
    commands: mpsc::UnboundedReceiver<SessionCommand>,
}

impl<E, S, M> SessionRuntime<E, S, M>
where
    E: EventSource + Send + 'static,
    S: Scheduler + Send + 'static,
    M: Messenger + Send + 'static,
{
    /// Spawn the loop for an already-initialized session
    ///
    /// `events` must be the receiving end of the channel the session's
    /// source, scheduler and messenger report into.
    pub fn spawn(
        session: ChatSession<E, S, M>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> SessionHandle {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let runtime = Self {
            session,
            events,
            commands,
        };
        SessionHandle {
            commands: commands_tx,
            task: tokio::spawn(runtime.run()),
        }
    }

    /// Run until closed or the handle is dropped; returns the final store
    pub async fn run(mut self) -> MessageStore {
        let conversation_id = self.session.context().conversation_id.clone();
        tracing::debug!(conversation_id = %conversation_id, "Session runtime started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Submit { text, reply }) => {
                            let outcome = self.session.submit(&text);
                            if let Err(ref e) = outcome {
                                tracing::debug!(error = %e, "Submit refused");
                            }
                            let _ = reply.send(outcome);
                        }
                        Some(SessionCommand::UpdateAuth(auth)) => self.session.update_auth(auth),
                        Some(SessionCommand::Close) | None => break,
                    }
                }
                Some(event) = self.events.recv() => {
                    self.session.handle_event(event);
                }
            }
        }

        self.session.close();
        tracing::debug!(conversation_id = %conversation_id, "Session runtime stopped");
        self.session.store().clone()
    }
}

// ============================================================================
// HTTP wiring
// ============================================================================

/// Settings for [`connect`]
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// API base URL
    pub api_url: Url,
    /// Session tunables
    pub session: SessionConfig,
    /// Connect timeout for the event stream
    pub connect_timeout: Duration,
    /// The first reply is already being generated
    pub new_conversation: bool,
}

/// A session over HTTP
pub type HttpChatSession<B> = ChatSession<HttpEventSource, TokioScheduler, BackendMessenger<B>>;

/// Fetch history, initialize a session over HTTP and start its runtime
///
/// Without auth, history is not fetched and the stream stays closed until
/// [`SessionHandle::update_auth`] provides a principal.
///
/// # Errors
///
/// Returns an error if the history fetch fails or the stream client cannot
/// be built.
pub async fn connect<B: ChatBackend + 'static>(
    backend: Arc<B>,
    context: SessionContext,
    options: ConnectOptions,
) -> Result<(SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>), BackendError> {
    let history = match context.auth {
        Some(ref auth) => {
            backend
                .fetch_messages(&auth.access_token, &context.conversation_id)
                .await?
        }
        None => Vec::new(),
    };

    // No total timeout: the stream stays open for the life of the session
    let stream_client = reqwest::Client::builder()
        .connect_timeout(options.connect_timeout)
        .build()?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    let mut session: HttpChatSession<B> = ChatSession::new(
        context,
        options.api_url,
        options.session,
        HttpEventSource::new(stream_client, events_tx.clone()),
        TokioScheduler::new(events_tx.clone()),
        BackendMessenger::new(backend, events_tx),
        updates_tx,
    );
    session.initialize(history, options.new_conversation);

    Ok((SessionRuntime::spawn(session, events_rx), updates_rx))
}
