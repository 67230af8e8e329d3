//! Chat Backend Traits
//!
//! The request/response half of the backend: history, sending, and the
//! conversation sidebar operations. The push half (the event stream) lives in
//! [`crate::transport`].
//!
//! # Design Philosophy
//!
//! The session core never awaits the backend. History is fetched before the
//! session is initialized, and sends go through a [`Messenger`], which returns
//! immediately and reports failure later as a
//! [`SessionEvent::SendFailed`](crate::events::SessionEvent::SendFailed).
//! That keeps the state machine synchronous.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::AccessToken;
use crate::messages::{Conversation, ConversationId, Message};

/// Errors from backend requests
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be sent or the response not read
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The response body was not the expected JSON
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the configured base
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

/// Request/response operations against the chat backend
///
/// Every call is authenticated with a bearer token.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetch the message history of a conversation, oldest first
    async fn fetch_messages(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, BackendError>;

    /// Submit a user message; the reply arrives on the event stream
    async fn send_message(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
        message: &str,
    ) -> Result<(), BackendError>;

    /// List the caller's conversations
    async fn list_conversations(&self, token: &AccessToken)
        -> Result<Vec<Conversation>, BackendError>;

    /// Rename a conversation
    async fn rename_conversation(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), BackendError>;

    /// Delete a conversation
    async fn delete_conversation(
        &self,
        token: &AccessToken,
        conversation_id: &ConversationId,
    ) -> Result<(), BackendError>;
}

/// A message send handed off by the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRequest {
    /// Credential to send with
    pub token: AccessToken,
    /// Target conversation
    pub conversation_id: ConversationId,
    /// Message text
    pub message: String,
}

/// Fire-and-forget message sending
///
/// `send` must not block. Failures are reported back to the session as an
/// event; the session never rolls back the user message it already appended.
pub trait Messenger {
    /// Dispatch a send
    fn send(&mut self, request: SendRequest);
}
