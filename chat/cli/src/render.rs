//! Terminal rendering of session updates
//!
//! Pure mapping from [`SessionUpdate`] to text so the chat loop stays thin.
//! Chat text goes to stdout; notices go to stderr next to the logs.

use finchat_core::{ConnectionState, Message, NotifyLevel, Sender, SessionUpdate};

/// Where a piece of output goes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// Chat transcript
    Stdout(String),
    /// Notices and status
    Stderr(String),
}

/// Stateful renderer; remembers whether a reply line is open
#[derive(Debug, Default)]
pub struct Renderer {
    /// A reply is being printed and needs a closing newline
    line_open: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one update; `None` when nothing should be printed
    pub fn render(&mut self, update: &SessionUpdate) -> Option<Output> {
        match update {
            SessionUpdate::Reset { messages } => {
                if messages.is_empty() {
                    return None;
                }
                let mut out = String::new();
                for message in messages {
                    out.push_str(&transcript_line(message));
                    out.push('\n');
                }
                Some(Output::Stdout(out))
            }
            SessionUpdate::Appended { message, .. } => match message.sender {
                // The user just typed it
                Sender::User => None,
                Sender::Assistant => {
                    let mut out = self.close_line();
                    out.push_str("assistant> ");
                    out.push_str(message.body());
                    self.line_open = true;
                    Some(Output::Stdout(out))
                }
            },
            SessionUpdate::Delta { text, .. } => {
                if self.line_open {
                    Some(Output::Stdout(text.clone()))
                } else {
                    self.line_open = true;
                    Some(Output::Stdout(format!("assistant> {text}")))
                }
            }
            SessionUpdate::TurnEnded { .. } => {
                let out = self.close_line();
                (!out.is_empty()).then_some(Output::Stdout(out))
            }
            SessionUpdate::Receiving(_) => None,
            SessionUpdate::Connection(state) => match state {
                ConnectionState::Retrying => Some(Output::Stderr("[reconnecting...]\n".into())),
                _ => None,
            },
            SessionUpdate::Notice(notice) => {
                let tag = match notice.level {
                    NotifyLevel::Warning => "warning",
                    NotifyLevel::Error => "error",
                };
                Some(Output::Stderr(format!("[{tag}] {notice}\n")))
            }
        }
    }

    fn close_line(&mut self) -> String {
        if std::mem::take(&mut self.line_open) {
            "\n".to_string()
        } else {
            String::new()
        }
    }
}

fn transcript_line(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    format!("{who}> {}", message.body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finchat_core::{ConversationId, Notice, NoticeKind, UserId};
    use pretty_assertions::assert_eq;

    fn conv() -> ConversationId {
        ConversationId::new("c")
    }

    fn stdout(s: &str) -> Option<Output> {
        Some(Output::Stdout(s.to_string()))
    }

    #[test]
    fn test_streamed_reply_renders_on_one_line() {
        let mut r = Renderer::new();

        assert_eq!(
            r.render(&SessionUpdate::Appended {
                index: 0,
                message: Message::user(conv(), UserId::default(), "hi"),
            }),
            None
        );
        assert_eq!(
            r.render(&SessionUpdate::Appended {
                index: 1,
                message: Message::placeholder(conv(), UserId::default()),
            }),
            stdout("assistant> ")
        );
        assert_eq!(
            r.render(&SessionUpdate::Delta { index: 1, text: "Hel".into() }),
            stdout("Hel")
        );
        assert_eq!(
            r.render(&SessionUpdate::Delta { index: 1, text: "lo".into() }),
            stdout("lo")
        );
        assert_eq!(r.render(&SessionUpdate::TurnEnded { index: 1 }), stdout("\n"));
        assert_eq!(r.render(&SessionUpdate::TurnEnded { index: 1 }), None);
    }

    #[test]
    fn test_history_transcript() {
        let mut r = Renderer::new();
        let messages = vec![
            Message::user(conv(), UserId::default(), "balance?"),
            Message::assistant(conv(), UserId::default(), "$40"),
        ];

        assert_eq!(
            r.render(&SessionUpdate::Reset { messages }),
            stdout("you> balance?\nassistant> $40\n")
        );
        assert_eq!(r.render(&SessionUpdate::Reset { messages: Vec::new() }), None);
    }

    #[test]
    fn test_new_placeholder_closes_previous_line() {
        let mut r = Renderer::new();
        r.render(&SessionUpdate::Delta { index: 1, text: "partial".into() });

        assert_eq!(
            r.render(&SessionUpdate::Appended {
                index: 3,
                message: Message::placeholder(conv(), UserId::default()),
            }),
            stdout("\nassistant> ")
        );
    }

    #[test]
    fn test_notices_go_to_stderr() {
        let mut r = Renderer::new();
        assert_eq!(
            r.render(&SessionUpdate::Notice(Notice::new(NoticeKind::SendFailed))),
            Some(Output::Stderr("[warning] Please try again.\n".into()))
        );
        assert_eq!(
            r.render(&SessionUpdate::Connection(ConnectionState::Retrying)),
            Some(Output::Stderr("[reconnecting...]\n".into()))
        );
        assert_eq!(r.render(&SessionUpdate::Receiving(true)), None);
    }
}
