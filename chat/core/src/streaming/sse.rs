//! Server-Sent Events decoder
//!
//! Incremental `text/event-stream` parser. Network reads split the stream at
//! arbitrary byte offsets, so bytes are buffered until a full line is present;
//! a multi-byte character straddling two reads is only decoded once complete.
//!
//! Supported fields: `data` (multi-line, joined with `\n`), `event`, `id`,
//! and `:` comments. `retry` is ignored: reconnect timing is the retry
//! controller's. Lines end in `\n` or `\r\n`, and a line may not grow past
//! [`MAX_LINE_BYTES`].

use thiserror::Error;

/// Event type used when the stream does not name one
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Longest line the decoder buffers before giving up on the stream
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// The stream sent a line longer than the decoder accepts
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("event stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    /// The limit that was exceeded
    pub limit: usize,
}

/// A dispatched event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`message` unless the stream set `event:`)
    pub event: String,
    /// Payload, with multiple `data:` lines joined by `\n`
    pub data: String,
    /// Last event id seen at dispatch time
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether this is a default `message` event
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}

/// Incremental decoder state
#[derive(Debug)]
pub struct SseDecoder {
    /// Bytes not yet terminated by a newline
    pending: Vec<u8>,
    /// Line length limit
    max_line: usize,
    /// Data lines of the event being assembled
    data: Vec<String>,
    /// Event type of the event being assembled
    event: Option<String>,
    /// Last `id:` value
    last_event_id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a custom line length limit
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            data: Vec::new(),
            event: None,
            last_event_id: None,
        }
    }

    /// Feed raw bytes; returns every event completed by them
    ///
    /// # Errors
    ///
    /// Returns [`LineTooLong`] once a line exceeds the limit. The decoder
    /// should be discarded along with the connection.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, LineTooLong> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            if pos > self.max_line {
                return Err(LineTooLong {
                    limit: self.max_line,
                });
            }
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.pending.len() > self.max_line {
            return Err(LineTooLong {
                limit: self.max_line,
            });
        }
        Ok(events)
    }

    /// Start from a known event id, as on a reconnect
    pub fn resume_from(&mut self, last_event_id: Option<String>) {
        self.last_event_id = last_event_id;
    }

    /// Last event id the server sent
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data,
            id: self.last_event_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(decoder: &mut SseDecoder, bytes: &[u8]) -> Vec<SseEvent> {
        decoder.feed(bytes).unwrap()
    }

    fn data_of(events: &[SseEvent]) -> Vec<&str> {
        events.iter().map(|e| e.data.as_str()).collect()
    }

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b"data: {\"message\":\"Hi\"}\n\n");

        assert_eq!(data_of(&events), vec![r#"{"message":"Hi"}"#]);
        assert!(events[0].is_message());
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut decoder = SseDecoder::new();

        assert!(feed(&mut decoder, b"data: {\"mess").is_empty());
        assert!(feed(&mut decoder, b"age\":\"lo\"}\n").is_empty());
        let events = feed(&mut decoder, b"\n");

        assert_eq!(data_of(&events), vec![r#"{"message":"lo"}"#]);
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let bytes = "data: café 📈\n\n".as_bytes();
        // Split inside the four-byte emoji
        let cut = bytes.len() - 4;
        let mut decoder = SseDecoder::new();

        assert!(feed(&mut decoder, &bytes[..cut]).is_empty());
        let events = feed(&mut decoder, &bytes[cut..]);

        assert_eq!(data_of(&events), vec!["café 📈"]);
    }

    #[test]
    fn test_crlf_and_multiple_events() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b"data: a\r\n\r\ndata: b\r\n\r\n");
        assert_eq!(data_of(&events), vec!["a", "b"]);
    }

    #[test]
    fn test_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b"data: line one\ndata: line two\n\n");
        assert_eq!(data_of(&events), vec!["line one\nline two"]);
    }

    #[test]
    fn test_comments_and_keepalives_ignored() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b": keep-alive\n\n:ping\ndata: x\n\n");
        assert_eq!(data_of(&events), vec!["x"]);
    }

    #[test]
    fn test_named_event_and_id() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b"event: status\nid: 7\ndata: up\n\ndata: next\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "status");
        assert!(!events[0].is_message());
        assert_eq!(events[0].id.as_deref(), Some("7"));
        // Event type resets after dispatch, id persists
        assert!(events[1].is_message());
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn test_retry_field_ignored() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b"retry: 1500\n\ndata: x\n\n");
        assert_eq!(data_of(&events), vec!["x"]);
    }

    #[test]
    fn test_resumed_id_carries_into_events() {
        let mut decoder = SseDecoder::new();
        decoder.resume_from(Some("41".into()));

        let events = feed(&mut decoder, b"data: x\n\nid: 42\ndata: y\n\n");

        assert_eq!(events[0].id.as_deref(), Some("41"));
        assert_eq!(events[1].id.as_deref(), Some("42"));
    }

    #[test]
    fn test_unterminated_line_over_limit_fails() {
        let mut decoder = SseDecoder::with_max_line(16);

        assert!(decoder.feed(b"data: 0123456789").is_ok());
        assert_eq!(decoder.feed(b"abcdef"), Err(LineTooLong { limit: 16 }));
    }

    #[test]
    fn test_terminated_line_over_limit_fails() {
        let mut decoder = SseDecoder::with_max_line(8);
        assert_eq!(
            decoder.feed(b"data: far too long\n\n"),
            Err(LineTooLong { limit: 8 })
        );

        let mut decoder = SseDecoder::with_max_line(8);
        assert_eq!(data_of(&feed(&mut decoder, b"data: ok\n\n")), vec!["ok"]);
    }

    #[test]
    fn test_data_without_space_and_empty_data() {
        let mut decoder = SseDecoder::new();
        let events = feed(&mut decoder, b"data:tight\n\ndata\n\n");
        assert_eq!(data_of(&events), vec!["tight", ""]);
    }
}
