//! Finchat Core - Headless Streaming Chat Session
//!
//! This crate provides the client-side core of finchat's assistant chat:
//! submitting messages, reassembling the streamed reply, and keeping the
//! server-push connection alive. It has no UI dependencies; a terminal, a web
//! view or a test harness all drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          View                                     │
//! │     (CLI, web frontend, tests)  ◄── SessionUpdate ──┐             │
//! │              │ submit / update_auth / close         │             │
//! └──────────────┼──────────────────────────────────────┼─────────────┘
//!                ▼                                      │
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     SessionRuntime (one tokio task)               │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                      ChatSession                            │  │
//! │  │  ┌──────────────┐  ┌───────────────────┐  ┌──────────────┐ │  │
//! │  │  │ MessageStore │◄─│ StreamReassembler │  │ Retry        │ │  │
//! │  │  │              │  │ (sentinels, fold) │  │ Controller   │ │  │
//! │  │  └──────────────┘  └───────────────────┘  └──────┬───────┘ │  │
//! │  └──────────────────────────────────────────────────┼─────────┘  │
//! │         ▲ SessionEvent                               │            │
//! │  ┌──────┴──────────┐ ┌────────────────┐ ┌────────────▼─────────┐ │
//! │  │BackendMessenger │ │ TokioScheduler │ │ HttpEventSource (SSE)│ │
//! │  └─────────────────┘ └────────────────┘ └──────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSession`]: the synchronous session state machine
//! - [`SessionRuntime`] / [`SessionHandle`]: the tokio event loop and its handle
//! - [`MessageStore`]: ordered messages for one conversation
//! - [`StreamReassembler`]: folds stream payloads into the trailing reply
//! - [`RetryController`]: bounded fixed-delay reconnects
//! - [`ChatBackend`] / [`HttpBackend`]: request/response API access
//!
//! # Module Overview
//!
//! - [`backend`]: history, send and conversation sidebar endpoints
//! - [`config`]: TOML + environment configuration
//! - [`context`]: conversation id and auth principal
//! - [`events`]: inbound events driving the session
//! - [`messages`]: messages, notices and view updates
//! - [`runtime`]: the tokio task around a session
//! - [`session`]: the session controller
//! - [`store`]: the message list
//! - [`streaming`]: SSE decoding and reply reassembly
//! - [`transport`]: connection lifecycle and retry

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod context;
pub mod events;
pub mod messages;
pub mod runtime;
pub mod session;
pub mod store;
pub mod streaming;
pub mod transport;

pub use reqwest::Url;

pub use backend::{BackendError, BackendMessenger, ChatBackend, HttpBackend, Messenger, SendRequest};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, FinchatConfig, FinchatToml,
};
pub use context::{AccessToken, AuthSession, SessionContext};
pub use events::SessionEvent;
pub use messages::{
    ConnectionState, Conversation, ConversationId, Message, Notice, NoticeKind, NotifyLevel,
    Sender, SessionUpdate, UserId,
};
pub use runtime::{connect, ConnectOptions, SessionCommand, SessionHandle, SessionRuntime};
pub use session::{ChatSession, SessionConfig, SubmitError};
pub use store::MessageStore;
pub use streaming::{Chunk, ChunkOutcome, Sentinels, SseDecoder, SseEvent, StreamReassembler};
pub use transport::{
    ConnectionId, EventSource, HttpEventSource, RetryConfig, RetryController, RetryDecision,
    Scheduler, TimerId, TokioScheduler, TransportError,
};
