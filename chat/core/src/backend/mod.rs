//! Chat Backend
//!
//! Request/response access to the chat API plus the fire-and-forget send
//! seam used by the session.

mod http;
mod messenger;
mod traits;

pub use http::{stream_url, HttpBackend};
pub use messenger::BackendMessenger;
pub use traits::{BackendError, ChatBackend, Messenger, SendRequest};
