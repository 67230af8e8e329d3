//! Tokio Scheduler
//!
//! [`Scheduler`] backed by `tokio::time::sleep`. Each timer is a small task
//! that reports [`SessionEvent::RetryTimerFired`] when it expires; cancelling
//! aborts the task so a cancelled timer never fires.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{Scheduler, TimerId};
use crate::events::SessionEvent;

/// Timer facility for reconnect delays
pub struct TokioScheduler {
    /// Where expiries go
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Last issued timer id
    next_id: u64,
    /// Armed timers
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Create a scheduler that reports into `events`
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            events,
            next_id: 0,
            timers: HashMap::new(),
        }
    }

    /// Number of timers armed and not yet fired
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|t| !t.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.timers.retain(|_, task| !task.is_finished());

        self.next_id += 1;
        let timer = TimerId(self.next_id);
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::RetryTimerFired { timer });
        });
        self.timers.insert(timer, task);
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.timers.remove(&timer) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}
