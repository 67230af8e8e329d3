//! Retry Controller
//!
//! Owns the stream connection lifecycle:
//!
//! ```text
//!            open()                on_open()
//!  Closed ───────────► Connecting ───────────► Open
//!    ▲                   ▲   │                  │
//!    │ close()   on_timer│   │ on_error()       │ on_error()
//!    │ (any state)       │   ▼                  ▼
//!    │                 Retrying ◄───────────────┘
//!    │                   │
//!    │                   │ retry_count == max_retries
//!    │                   ▼
//!    └──────────────── Failed
//! ```
//!
//! Reconnects use a fixed delay and a hard ceiling. After `max_retries`
//! consecutive errors nothing more is scheduled; the user is told to refresh.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::traits::{redact_url, ConnectionId, EventSource, Scheduler, TimerId, TransportError};
use crate::messages::ConnectionState;

/// Reconnect policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before each reconnect attempt
    pub delay: Duration,
    /// Consecutive errors after which the session gives up
    pub max_retries: u32,
    /// Add up to 25% random jitter to the delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(2000),
            max_retries: 5,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Delay to wait before the next reconnect
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.jitter {
            let factor = 1.0 + rand::random::<f64>() * 0.25;
            self.delay.mul_f64(factor)
        } else {
            self.delay
        }
    }
}

/// What the controller did with a transport error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// The error came from a superseded connection
    Stale,
    /// A reconnect was scheduled
    Rescheduled {
        /// Consecutive failures so far
        attempt: u32,
        /// Delay before reconnecting
        delay: Duration,
    },
    /// The ceiling was reached; no further attempts
    Failed,
}

/// Stream connection lifecycle with bounded reconnects
pub struct RetryController<E: EventSource, S: Scheduler> {
    /// The injectable stream subscription
    source: E,
    /// The injectable timer facility
    scheduler: S,
    /// Reconnect policy
    config: RetryConfig,
    /// Where to (re)connect
    url: Option<Url>,
    /// The live connection attempt
    current: Option<ConnectionId>,
    /// The armed reconnect timer
    pending_timer: Option<TimerId>,
    /// Consecutive errors since the last successful open
    retry_count: u32,
    /// Lifecycle state
    state: ConnectionState,
}

impl<E: EventSource, S: Scheduler> RetryController<E, S> {
    /// Create a closed controller
    pub fn new(source: E, scheduler: S, config: RetryConfig) -> Self {
        Self {
            source,
            scheduler,
            config,
            url: None,
            current: None,
            pending_timer: None,
            retry_count: 0,
            state: ConnectionState::Closed,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive errors since the last successful open
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The live connection id, if any
    #[must_use]
    pub fn current(&self) -> Option<ConnectionId> {
        self.current
    }

    /// Whether a reconnect timer is armed
    #[must_use]
    pub fn has_pending_retry(&self) -> bool {
        self.pending_timer.is_some()
    }

    /// Whether a connection is open, opening, or about to be retried
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Retrying
        )
    }

    /// The event source
    pub fn source(&self) -> &E {
        &self.source
    }

    /// The scheduler
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Open a fresh subscription, replacing any existing one
    pub fn open(&mut self, url: Url) {
        self.cancel_timer();
        if self.current.take().is_some() {
            self.source.close();
        }

        let connection = self.source.open(&url);
        tracing::debug!(
            connection = %connection,
            url = %redact_url(&url),
            "Opening event stream"
        );

        self.url = Some(url);
        self.current = Some(connection);
        self.retry_count = 0;
        self.state = ConnectionState::Connecting;
    }

    /// Open only if nothing is active (closed or failed)
    ///
    /// Returns whether a new connection was started.
    pub fn ensure_open(&mut self, url: Url) -> bool {
        if self.is_active() {
            return false;
        }
        self.open(url);
        true
    }

    /// Whether events from `connection` should be applied
    #[must_use]
    pub fn is_current(&self, connection: ConnectionId) -> bool {
        self.current == Some(connection)
    }

    /// The connection reported it is open
    ///
    /// Returns false for a superseded connection.
    pub fn on_open(&mut self, connection: ConnectionId) -> bool {
        if !self.is_current(connection) {
            return false;
        }
        if self.retry_count > 0 {
            tracing::info!(
                connection = %connection,
                after_attempts = self.retry_count,
                "Event stream reconnected"
            );
        }
        self.retry_count = 0;
        self.state = ConnectionState::Open;
        true
    }

    /// The connection failed or was ended by the server
    pub fn on_error(&mut self, connection: ConnectionId, error: &TransportError) -> RetryDecision {
        if !self.is_current(connection) {
            tracing::debug!(connection = %connection, "Ignoring error from superseded stream");
            return RetryDecision::Stale;
        }

        self.source.close();
        self.current = None;
        self.retry_count += 1;

        if self.retry_count >= self.config.max_retries {
            tracing::error!(
                connection = %connection,
                retry_count = self.retry_count,
                error = %error,
                "Event stream failed; giving up"
            );
            self.state = ConnectionState::Failed;
            return RetryDecision::Failed;
        }

        let delay = self.config.next_delay();
        tracing::warn!(
            connection = %connection,
            attempt = self.retry_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Event stream failed, retrying"
        );
        self.pending_timer = Some(self.scheduler.schedule(delay));
        self.state = ConnectionState::Retrying;

        RetryDecision::Rescheduled {
            attempt: self.retry_count,
            delay,
        }
    }

    /// A timer fired; reconnect if it is ours
    ///
    /// Returns whether a reconnect was started.
    pub fn on_timer(&mut self, timer: TimerId) -> bool {
        if self.pending_timer != Some(timer) {
            return false;
        }
        self.pending_timer = None;

        let Some(url) = self.url.clone() else {
            return false;
        };
        let connection = self.source.open(&url);
        tracing::debug!(
            connection = %connection,
            attempt = self.retry_count,
            "Reconnecting event stream"
        );
        self.current = Some(connection);
        self.state = ConnectionState::Connecting;
        true
    }

    /// Tear down: cancel the timer and close the connection
    ///
    /// Idempotent; every exit path may call it.
    pub fn close(&mut self) {
        self.cancel_timer();
        if self.current.take().is_some() {
            self.source.close();
        }
        self.url = None;
        self.retry_count = 0;
        self.state = ConnectionState::Closed;
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            self.scheduler.cancel(timer);
        }
    }
}

impl<E: EventSource, S: Scheduler> Drop for RetryController<E, S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct FakeSource {
        next: u64,
        opened: Vec<String>,
        closes: usize,
        live: bool,
    }

    impl EventSource for FakeSource {
        fn open(&mut self, url: &Url) -> ConnectionId {
            if self.live {
                self.closes += 1;
            }
            self.live = true;
            self.next += 1;
            self.opened.push(url.to_string());
            ConnectionId(self.next)
        }

        fn close(&mut self) {
            if self.live {
                self.closes += 1;
            }
            self.live = false;
        }
    }

    #[derive(Default)]
    struct FakeScheduler {
        next: u64,
        scheduled: Vec<Duration>,
        cancelled: Vec<TimerId>,
    }

    impl Scheduler for FakeScheduler {
        fn schedule(&mut self, delay: Duration) -> TimerId {
            self.next += 1;
            self.scheduled.push(delay);
            TimerId(self.next)
        }

        fn cancel(&mut self, timer: TimerId) {
            self.cancelled.push(timer);
        }
    }

    fn url() -> Url {
        Url::parse("http://api.test/sse/c1?token=t").unwrap()
    }

    fn controller(max_retries: u32) -> RetryController<FakeSource, FakeScheduler> {
        RetryController::new(
            FakeSource::default(),
            FakeScheduler::default(),
            RetryConfig {
                delay: Duration::from_millis(2000),
                max_retries,
                jitter: false,
            },
        )
    }

    fn fail(rc: &mut RetryController<FakeSource, FakeScheduler>) -> RetryDecision {
        let conn = rc.current().expect("a live connection");
        rc.on_error(conn, &TransportError::ConnectionFailed("reset".into()))
    }

    #[test]
    fn test_open_then_connected() {
        let mut rc = controller(5);
        assert_eq!(rc.state(), ConnectionState::Closed);

        rc.open(url());
        assert_eq!(rc.state(), ConnectionState::Connecting);

        let conn = rc.current().unwrap();
        assert!(rc.on_open(conn));
        assert_eq!(rc.state(), ConnectionState::Open);
        assert_eq!(rc.retry_count(), 0);
    }

    #[test]
    fn test_reopen_closes_previous_connection() {
        let mut rc = controller(5);
        rc.open(url());
        let first = rc.current().unwrap();

        rc.open(url());
        let second = rc.current().unwrap();

        assert_ne!(first, second);
        assert_eq!(rc.source().closes, 1);
        assert!(!rc.is_current(first));
        assert!(!rc.on_open(first));
    }

    #[test]
    fn test_error_schedules_fixed_delay_retry() {
        let mut rc = controller(5);
        rc.open(url());

        let decision = fail(&mut rc);

        assert_eq!(
            decision,
            RetryDecision::Rescheduled {
                attempt: 1,
                delay: Duration::from_millis(2000),
            }
        );
        assert_eq!(rc.state(), ConnectionState::Retrying);
        assert!(rc.has_pending_retry());
        assert_eq!(rc.current(), None);

        // Timer fires: reconnect
        assert!(rc.on_timer(TimerId(1)));
        assert_eq!(rc.state(), ConnectionState::Connecting);
        assert_eq!(rc.source().opened.len(), 2);
    }

    #[test]
    fn test_max_retries_fails_without_another_attempt() {
        let max = 3;
        let mut rc = controller(max);
        rc.open(url());

        for attempt in 1..max {
            assert!(matches!(fail(&mut rc), RetryDecision::Rescheduled { .. }));
            assert!(rc.on_timer(TimerId(u64::from(attempt))));
        }
        assert_eq!(fail(&mut rc), RetryDecision::Failed);

        assert_eq!(rc.state(), ConnectionState::Failed);
        assert!(!rc.has_pending_retry());
        // Initial open + (max - 1) reconnects; the next attempt never happens
        assert_eq!(rc.source().opened.len(), max as usize);
        assert_eq!(rc.scheduler().scheduled.len(), (max - 1) as usize);
        assert!(!rc.on_timer(TimerId(99)));
        assert_eq!(rc.source().opened.len(), max as usize);
    }

    #[test]
    fn test_successful_open_resets_retry_count() {
        let mut rc = controller(3);
        rc.open(url());
        fail(&mut rc);
        fail_after_timer(&mut rc, 1);
        assert_eq!(rc.retry_count(), 2);

        rc.on_timer(TimerId(2));
        let conn = rc.current().unwrap();
        rc.on_open(conn);
        assert_eq!(rc.retry_count(), 0);

        // Budget is fresh again
        assert!(matches!(fail(&mut rc), RetryDecision::Rescheduled { attempt: 1, .. }));
    }

    fn fail_after_timer(rc: &mut RetryController<FakeSource, FakeScheduler>, timer: u64) {
        assert!(rc.on_timer(TimerId(timer)));
        fail(rc);
    }

    #[test]
    fn test_stale_error_ignored() {
        let mut rc = controller(5);
        rc.open(url());
        let old = rc.current().unwrap();
        rc.open(url());

        let decision = rc.on_error(old, &TransportError::ClosedByServer);

        assert_eq!(decision, RetryDecision::Stale);
        assert_eq!(rc.retry_count(), 0);
        assert_eq!(rc.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_close_cancels_timer_and_is_idempotent() {
        let mut rc = controller(5);
        rc.open(url());
        fail(&mut rc);
        assert!(rc.has_pending_retry());

        rc.close();
        rc.close();

        assert_eq!(rc.state(), ConnectionState::Closed);
        assert_eq!(rc.scheduler().cancelled, vec![TimerId(1)]);
        assert!(!rc.on_timer(TimerId(1)));
        assert_eq!(rc.source().opened.len(), 1);
    }

    #[test]
    fn test_close_releases_open_connection() {
        let mut rc = controller(5);
        rc.open(url());

        rc.close();

        assert_eq!(rc.source().closes, 1);
        assert!(!rc.source().live);
    }

    #[test]
    fn test_ensure_open_only_when_inactive() {
        let mut rc = controller(1);
        assert!(rc.ensure_open(url()));
        assert!(!rc.ensure_open(url()));

        assert_eq!(fail(&mut rc), RetryDecision::Failed);
        assert!(rc.ensure_open(url()));
        assert_eq!(rc.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig {
            delay: Duration::from_millis(1000),
            max_retries: 5,
            jitter: true,
        };
        for _ in 0..50 {
            let delay = config.next_delay();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1250));
        }
    }
}
