//! Streaming Reassembly
//!
//! Everything between raw stream bytes and the message store:
//!
//! ```text
//!   bytes ──► SseDecoder ──► SseEvent.data ──► Chunk::parse ──► StreamReassembler ──► MessageStore
//!             (framing)       (payload)        (normalize)      (sentinels, fold)     (append_to_last)
//! ```
//!
//! Chunks are applied in arrival order with no reordering buffer; payloads
//! carry no sequence numbers, so duplicates or reordering by the transport are
//! not corrected here.

mod chunk;
mod reassembler;
pub mod sse;

pub use chunk::{Chunk, Sentinels};
pub use reassembler::{ChunkOutcome, StreamReassembler};
pub use sse::{LineTooLong, SseDecoder, SseEvent, MAX_LINE_BYTES};
