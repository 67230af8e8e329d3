//! Stream Transport
//!
//! Connection lifecycle for the server-push stream.
//!
//! # Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ RetryController   state machine, retry cap    │
//! ├──────────────────────┬───────────────────────┤
//! │ EventSource (trait)  │ Scheduler (trait)      │
//! ├──────────────────────┼───────────────────────┤
//! │ HttpEventSource      │ TokioScheduler         │
//! │ (reqwest + SSE)      │ (tokio::time::sleep)   │
//! └──────────────────────┴───────────────────────┘
//! ```
//!
//! The controller never touches sockets or clocks directly, so the whole
//! reconnect policy is exercised in tests with fakes.

mod retry;
mod scheduler;
mod sse_source;
mod traits;

pub use retry::{RetryConfig, RetryController, RetryDecision};
pub use scheduler::TokioScheduler;
pub use sse_source::HttpEventSource;
pub use traits::{redact_url, ConnectionId, EventSource, Scheduler, TimerId, TransportError};
