//! Stream Reassembler
//!
//! Folds normalized chunks into the trailing assistant message and tracks the
//! `receiving` flag that gates user input. It knows nothing about the network:
//! retry and reconnection live in [`crate::transport::RetryController`].

use crate::messages::UserId;
use crate::store::MessageStore;

use super::chunk::{Chunk, Sentinels};

/// What applying one chunk did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Text was appended to the message at `index`
    Appended {
        /// Position of the message that grew
        index: usize,
        /// Whether a placeholder was synthesized before appending
        placeholder_created: bool,
        /// The appended text
        text: String,
    },
    /// The end-of-turn sentinel arrived
    TurnEnded {
        /// The placeholder that was closed, if one was open
        index: Option<usize>,
    },
    /// The error sentinel arrived
    TurnFailed {
        /// The placeholder that was closed, if one was open
        index: Option<usize>,
    },
    /// Nothing to do (empty payload)
    Ignored,
}

/// Pure fold from stream payloads to store mutations
#[derive(Clone, Debug, Default)]
pub struct StreamReassembler {
    /// Reserved sentinel values
    sentinels: Sentinels,
    /// True from submit until a terminal sentinel
    receiving: bool,
}

impl StreamReassembler {
    /// Create a reassembler recognizing the given sentinels
    #[must_use]
    pub fn new(sentinels: Sentinels) -> Self {
        Self {
            sentinels,
            receiving: false,
        }
    }

    /// Whether a reply is currently expected
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Mark the start of a turn before any chunk arrives
    pub fn begin_turn(&mut self) {
        self.receiving = true;
    }

    /// Clear the flag without a sentinel (connection failure, teardown)
    pub fn abort_turn(&mut self) {
        self.receiving = false;
    }

    /// Normalize a raw payload and apply it
    pub fn apply(&mut self, store: &mut MessageStore, payload: &str, owner: &UserId) -> ChunkOutcome {
        let chunk = Chunk::parse(payload, &self.sentinels);
        self.apply_chunk(store, chunk, owner)
    }

    /// Apply an already-normalized chunk
    pub fn apply_chunk(
        &mut self,
        store: &mut MessageStore,
        chunk: Chunk,
        owner: &UserId,
    ) -> ChunkOutcome {
        match chunk {
            Chunk::EndOfTurn => {
                self.receiving = false;
                ChunkOutcome::TurnEnded {
                    index: store.complete_open(),
                }
            }
            Chunk::Error => {
                self.receiving = false;
                ChunkOutcome::TurnFailed {
                    index: store.complete_open(),
                }
            }
            Chunk::Text(text) => {
                self.receiving = true;
                let appended = store.append_to_last(&text, owner);
                ChunkOutcome::Appended {
                    index: appended.index,
                    placeholder_created: appended.placeholder_created,
                    text,
                }
            }
            Chunk::Empty => ChunkOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ConversationId, Message, Sender};
    use pretty_assertions::assert_eq;

    fn owner() -> UserId {
        UserId::new("u")
    }

    fn store_with_placeholder() -> MessageStore {
        let conv = ConversationId::new("c");
        let mut store = MessageStore::new(conv.clone());
        store.append(Message::user(conv.clone(), owner(), "hi"));
        store.append(Message::placeholder(conv, owner()));
        store
    }

    fn fold(chunks: &[&str]) -> String {
        let mut store = store_with_placeholder();
        let mut reassembler = StreamReassembler::default();
        for chunk in chunks {
            reassembler.apply(&mut store, chunk, &owner());
        }
        store.last().unwrap().body().to_string()
    }

    #[test]
    fn test_concatenation_independent_of_split() {
        let text = "Your checking account: $1,204.55 — up 3% 📈";
        let whole = fold(&[text]);
        assert_eq!(whole, text);

        let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).skip(1).collect();
        for &split in &boundaries {
            let (a, b) = text.split_at(split);
            assert_eq!(fold(&[a, b]), whole, "split at byte {split}");
        }

        // Every character as its own chunk
        let singles: Vec<String> = text.chars().map(String::from).collect();
        let singles: Vec<&str> = singles.iter().map(String::as_str).collect();
        assert_eq!(fold(&singles), whole);
    }

    #[test]
    fn test_hel_lo_done() {
        let mut store = store_with_placeholder();
        let mut reassembler = StreamReassembler::default();
        reassembler.begin_turn();

        reassembler.apply(&mut store, r#"{"message":"Hel"}"#, &owner());
        reassembler.apply(&mut store, r#"{"message":"lo"}"#, &owner());
        assert!(reassembler.is_receiving());

        let outcome = reassembler.apply(&mut store, r#"{"message":"[DONE]"}"#, &owner());

        assert_eq!(outcome, ChunkOutcome::TurnEnded { index: Some(1) });
        assert_eq!(store.last().unwrap().body(), "Hello");
        assert!(!reassembler.is_receiving());
        assert!(!store.last().unwrap().is_streaming());
    }

    #[test]
    fn test_end_sentinel_leaves_body_unchanged() {
        let mut store = store_with_placeholder();
        let mut reassembler = StreamReassembler::default();
        reassembler.apply(&mut store, "partial", &owner());
        let before = store.messages().to_vec();

        reassembler.apply(&mut store, "[DONE]", &owner());

        assert_eq!(store.len(), before.len());
        assert_eq!(store.last().unwrap().body(), before.last().unwrap().body());
        assert!(!reassembler.is_receiving());
    }

    #[test]
    fn test_error_sentinel() {
        let mut store = store_with_placeholder();
        let mut reassembler = StreamReassembler::default();
        reassembler.apply(&mut store, "Looking up", &owner());

        let outcome = reassembler.apply(&mut store, r#"{"message":"[ERROR]"}"#, &owner());

        assert_eq!(outcome, ChunkOutcome::TurnFailed { index: Some(1) });
        assert_eq!(store.last().unwrap().body(), "Looking up");
        assert!(!reassembler.is_receiving());
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut store = store_with_placeholder();
        let mut reassembler = StreamReassembler::default();

        assert_eq!(reassembler.apply(&mut store, "", &owner()), ChunkOutcome::Ignored);
        assert_eq!(
            reassembler.apply(&mut store, r#"{"message":""}"#, &owner()),
            ChunkOutcome::Ignored
        );
        assert!(!reassembler.is_receiving());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_text_sets_receiving() {
        let mut store = store_with_placeholder();
        let mut reassembler = StreamReassembler::default();
        assert!(!reassembler.is_receiving());

        reassembler.apply(&mut store, "x", &owner());
        assert!(reassembler.is_receiving());
    }

    #[test]
    fn test_chunk_after_user_message() {
        let conv = ConversationId::new("c");
        let mut store = MessageStore::new(conv.clone());
        store.append(Message::user(conv, owner(), "reloaded mid-turn"));
        let mut reassembler = StreamReassembler::default();

        let outcome = reassembler.apply(&mut store, "chunk", &owner());

        assert_eq!(
            outcome,
            ChunkOutcome::Appended {
                index: 1,
                placeholder_created: true,
                text: "chunk".into(),
            }
        );
        let assistants: Vec<&Message> = store.iter().filter(|m| m.sender == Sender::Assistant).collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].body(), "chunk");
    }

    #[test]
    fn test_json_looking_deltas_fold_verbatim() {
        assert_eq!(fold(&["Here: ", "[1,2]", " \"q\""]), "Here: [1,2] \"q\"");
        assert_eq!(fold(&["say ", "\"hi\""]), "say \"hi\"");
        assert_eq!(fold(&["a", "{}", "b"]), "a{}b");
    }
}
