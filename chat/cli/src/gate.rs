//! Input gating for the chat loop
//!
//! Stdin is only read while no reply is streaming, so a line typed (or piped)
//! mid-reply waits for the turn to end instead of opening a second one.

use finchat_core::SessionUpdate;

/// Tracks whether stdin may be read and when the loop is done
#[derive(Debug)]
pub struct InputGate {
    /// Stdin has not reached end of input
    stdin_open: bool,
    /// A reply is pending or streaming
    receiving: bool,
}

impl InputGate {
    /// `receiving` is true when the session starts with a reply pending
    pub fn new(receiving: bool) -> Self {
        Self {
            stdin_open: true,
            receiving,
        }
    }

    /// Whether the next stdin line may be read
    pub fn accepts_input(&self) -> bool {
        self.stdin_open && !self.receiving
    }

    /// A submit was accepted; close the gate before the session says so
    pub fn submitted(&mut self) {
        self.receiving = true;
    }

    /// Track the session's receiving flag
    pub fn observe(&mut self, update: &SessionUpdate) {
        if let SessionUpdate::Receiving(receiving) = update {
            self.receiving = *receiving;
        }
    }

    /// Stdin reached end of input
    pub fn stdin_closed(&mut self) {
        self.stdin_open = false;
    }

    /// Input is exhausted and no reply is outstanding
    pub fn finished(&self) -> bool {
        !self.stdin_open && !self.receiving
    }
}
