//! Chunk normalization
//!
//! Stream payloads arrive either as a JSON envelope (`{"message": "..."}`) or
//! as a bare delta string. Only an object with a string `message` field is
//! treated as an envelope; every other payload is text, byte for byte, even
//! when it happens to parse as JSON (`[1,2]`, `"hi"`, `{}`).

use serde_json::Value;

/// Reserved payload values used as out-of-band signals
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sentinels {
    /// Marks the end of an assistant turn
    pub end_of_turn: String,
    /// Marks a generation failure
    pub error: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            end_of_turn: "[DONE]".to_string(),
            error: "[ERROR]".to_string(),
        }
    }
}

/// One normalized stream event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    /// Assistant text to append
    Text(String),
    /// Empty payload; valid but carries nothing
    Empty,
    /// The end-of-turn sentinel
    EndOfTurn,
    /// The error sentinel
    Error,
}

impl Chunk {
    /// Normalize a raw event payload
    #[must_use]
    pub fn parse(payload: &str, sentinels: &Sentinels) -> Self {
        if payload.is_empty() {
            return Self::Empty;
        }

        let text = envelope_message(payload).unwrap_or_else(|| payload.to_string());

        if text == sentinels.end_of_turn {
            Self::EndOfTurn
        } else if text == sentinels.error {
            Self::Error
        } else if text.is_empty() {
            Self::Empty
        } else {
            Self::Text(text)
        }
    }
}

/// The `message` field of a `{"message": "..."}` envelope
fn envelope_message(payload: &str) -> Option<String> {
    if !payload.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(mut map)) => match map.remove("message") {
            Some(Value::String(msg)) => Some(msg),
            _ => None,
        },
        _ => None,
    }
}
