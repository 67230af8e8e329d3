//! Message Store
//!
//! The ordered message list for one conversation. The list is append-only
//! except for the body of the trailing assistant message, which grows in
//! place while a reply streams in.
//!
//! Ordering is position in the list. Timestamps are display data only; two
//! messages created in the same millisecond keep their append order.

use crate::messages::{ConversationId, Message, UserId};

/// Result of [`MessageStore::append_to_last`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastAppend {
    /// Index of the message that received the text
    pub index: usize,
    /// Whether a placeholder had to be synthesized first
    pub placeholder_created: bool,
}

/// Memory-resident message list for the active conversation
#[derive(Clone, Debug)]
pub struct MessageStore {
    /// Conversation these messages belong to
    conversation_id: ConversationId,
    /// Messages in display order
    messages: Vec<Message>,
    /// Index of the open assistant placeholder, if any
    open: Option<usize>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            messages: Vec::new(),
            open: None,
        }
    }

    /// Conversation this store belongs to
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Replace the contents with a pre-fetched history
    pub fn seed(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.open = None;
        for msg in &mut self.messages {
            msg.set_streaming(false);
        }
    }

    /// Append a message and return its index
    ///
    /// Appending a placeholder closes whichever placeholder was open before,
    /// so at most one assistant message receives chunks at a time.
    pub fn append(&mut self, message: Message) -> usize {
        let streaming = message.is_streaming();
        if streaming {
            self.complete_open();
        }

        let index = self.messages.len();
        self.messages.push(message);
        if streaming {
            self.open = Some(index);
        }
        index
    }

    /// Append streamed text to the trailing assistant message
    ///
    /// If the list is empty or ends with a user message (a reload landed
    /// mid-turn and the submit never happened here), a placeholder owned by
    /// `owner` is appended first.
    pub fn append_to_last(&mut self, delta: &str, owner: &UserId) -> LastAppend {
        let needs_placeholder = self.messages.last().map_or(true, |m| !m.is_assistant());

        if needs_placeholder {
            tracing::debug!(
                conversation_id = %self.conversation_id,
                "Synthesizing assistant placeholder for orphaned chunk"
            );
            self.append(Message::placeholder(
                self.conversation_id.clone(),
                owner.clone(),
            ));
        }

        let index = self.messages.len() - 1;
        if self.open != Some(index) {
            self.complete_open();
            self.messages[index].set_streaming(true);
            self.open = Some(index);
        }
        self.messages[index].push_body(delta);

        LastAppend {
            index,
            placeholder_created: needs_placeholder,
        }
    }

    /// Close the open placeholder, returning its index
    pub fn complete_open(&mut self) -> Option<usize> {
        let index = self.open.take()?;
        if let Some(msg) = self.messages.get_mut(index) {
            msg.set_streaming(false);
        }
        Some(index)
    }

    /// Index of the open placeholder
    #[must_use]
    pub fn open_index(&self) -> Option<usize> {
        self.open
    }

    /// The most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Message at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterate messages in order
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
