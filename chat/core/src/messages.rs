//! Chat Messages and Session Updates
//!
//! Data carried between the backend, the session core and whatever view is
//! bound to it.
//!
//! # Design Philosophy
//!
//! The session core is the only writer of conversation state. Views are pure
//! renderers: they receive [`SessionUpdate`]s after every mutation and draw
//! what they are told. This keeps the core testable without any UI mounted
//! and lets a terminal, a web page or a test harness observe the same stream.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque conversation identifier, stable for a session's lifetime
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Wrap an identifier issued by the backend
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier of the authoring principal
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wrap an account identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    /// The human user
    #[serde(rename = "UserMessage")]
    User,
    /// The assistant
    #[serde(rename = "AIMessage")]
    Assistant,
}

/// A message in a conversation
///
/// The wire shape matches the backend's history endpoint:
/// `{conversation_id, user_id, sender, message, timestamp}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Account that owns the conversation
    #[serde(default)]
    pub user_id: UserId,
    /// Who sent this message
    pub sender: Sender,
    /// Message text
    #[serde(rename = "message")]
    body: String,
    /// Display timestamp; never used for ordering
    #[serde(rename = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Whether this is the placeholder currently receiving chunks
    #[serde(skip)]
    streaming: bool,
}

impl Message {
    /// Create a user message; its body never changes afterwards
    pub fn user(
        conversation_id: ConversationId,
        user_id: UserId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            user_id,
            sender: Sender::User,
            body: body.into(),
            created_at: Utc::now(),
            streaming: false,
        }
    }

    /// Create a completed assistant message
    pub fn assistant(
        conversation_id: ConversationId,
        user_id: UserId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            user_id,
            sender: Sender::Assistant,
            body: body.into(),
            created_at: Utc::now(),
            streaming: false,
        }
    }

    /// Create an empty assistant placeholder that will receive chunks
    pub fn placeholder(conversation_id: ConversationId, user_id: UserId) -> Self {
        Self {
            conversation_id,
            user_id,
            sender: Sender::Assistant,
            body: String::new(),
            created_at: Utc::now(),
            streaming: true,
        }
    }

    /// Message text
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether this message was authored by the assistant
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }

    /// Whether this is the open placeholder
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Append streamed text. Only the store calls this, and only on assistant messages.
    pub(crate) fn push_body(&mut self, text: &str) {
        debug_assert!(self.is_assistant(), "user message bodies are immutable");
        self.body.push_str(text);
    }

    pub(crate) fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }
}

/// Accept RFC 3339 timestamps, and naive ISO timestamps as UTC
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Conversation metadata as listed by the sidebar endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier
    pub id: ConversationId,
    /// Display title
    pub title: String,
    /// Creation time as an epoch number
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
}

// ============================================================================
// Notices
// ============================================================================

/// Severity of a user-facing notice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Something the user should retry
    Warning,
    /// Something went wrong that the user cannot fix by retrying the action
    Error,
}

/// What a notice is about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    /// The backend reported it could not generate a reply
    GenerationFailed,
    /// The message send request failed
    SendFailed,
    /// No authenticated session was available
    NotAuthenticated,
    /// Reconnects were exhausted
    StaleConnection,
}

/// A user-facing alert
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// What happened
    pub kind: NoticeKind,
    /// Severity
    pub level: NotifyLevel,
    /// Display text
    pub message: String,
}

impl Notice {
    /// Build the standard notice for a kind
    #[must_use]
    pub fn new(kind: NoticeKind) -> Self {
        let (level, message) = match kind {
            NoticeKind::GenerationFailed => (
                NotifyLevel::Error,
                "There was an issue generating your response. Please try again.",
            ),
            NoticeKind::SendFailed | NoticeKind::NotAuthenticated => {
                (NotifyLevel::Warning, "Please try again.")
            }
            NoticeKind::StaleConnection => (
                NotifyLevel::Error,
                "The connection has gone stale. Please refresh the page.",
            ),
        };
        Self {
            kind,
            level,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

// ============================================================================
// Connection + Updates
// ============================================================================

/// Lifecycle state of the stream connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and nothing scheduled
    #[default]
    Closed,
    /// A connection attempt is in flight
    Connecting,
    /// The stream is delivering events
    Open,
    /// Waiting for the retry timer before reconnecting
    Retrying,
    /// Reconnects exhausted; the session will not try again
    Failed,
}

/// Updates published to the view after every state change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The store was replaced wholesale (history seeding)
    Reset {
        /// Full message list
        messages: Vec<Message>,
    },
    /// A message was appended
    Appended {
        /// Position in the store
        index: usize,
        /// The new message
        message: Message,
    },
    /// Text was appended to the message at `index`
    Delta {
        /// Position in the store
        index: usize,
        /// Appended text
        text: String,
    },
    /// The open placeholder at `index` stopped receiving
    TurnEnded {
        /// Position in the store
        index: usize,
    },
    /// The input-gating flag changed
    Receiving(bool),
    /// The stream connection changed state
    Connection(ConnectionState),
    /// A user-facing alert
    Notice(Notice),
}
