//! # Client events emitted by the connection guard, dispatch tasks and shutdown.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Connection**: connect, retry, disconnect
//! - **Subscriptions**: subscribe/unsubscribe, dispatch task start/stop
//! - **Failures**: handler errors and panics, asynchronous transport errors, drops
//! - **Shutdown**: stop requested, all stopped within grace, grace exceeded
//!
//! The [`Event`] struct carries the metadata: timestamp, topic, error text, reason.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases
//! monotonically; use it to restore order across observers.
//!
//! ## Example
//! ```rust
//! use messagebus::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::HandlerFailed)
//!     .with_topic("sensors/temp")
//!     .with_error("bad reading");
//!
//! assert_eq!(ev.kind, EventKind::HandlerFailed);
//! assert_eq!(ev.topic.as_deref(), Some("sensors/temp"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of client events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Connection ===
    /// Transport connected.
    Connected,

    /// A connect attempt failed and another one is scheduled.
    ///
    /// Sets `attempt`, `delay`, `error`.
    ConnectRetryScheduled,

    /// Transport released; the client is closed.
    Disconnected,

    // === Subscriptions ===
    /// Topic pattern registered with the transport.
    ///
    /// Sets `topic`.
    Subscribed,

    /// Topic pattern unregistered.
    ///
    /// Sets `topic`.
    Unsubscribed,

    /// Dispatch task started for a pattern.
    ///
    /// Sets `topic`.
    DispatchStarted,

    /// Dispatch task exited.
    ///
    /// Sets `topic`, `reason` (`shutdown`, `unsubscribed`, `channel_closed`).
    DispatchStopped,

    // === Failures ===
    /// Handler returned an error; delivery continues.
    ///
    /// Sets `topic` (effective topic), `error`.
    HandlerFailed,

    /// Handler panicked; delivery continues.
    ///
    /// Sets `topic`, `error` (panic message).
    HandlerPanicked,

    /// Asynchronous error taken off the shared error channel.
    ///
    /// Sets `topic` (pattern of the dispatch task that observed it), `error`.
    AsyncError,

    /// Asynchronous error dropped because the error channel was full or closed.
    ///
    /// Sets `error`, `reason` (`full`, `closed`).
    ErrorDropped,

    /// Observer dropped an event (queue full or worker closed).
    ///
    /// Sets `reason` (observer name and cause).
    ObserverOverflow,

    /// Observer panicked while handling an event.
    ///
    /// Sets `reason` (observer name), `error` (panic message).
    ObserverPanicked,

    // === Shutdown ===
    /// Disconnect started; dispatch tasks are being cancelled.
    ShutdownRequested,

    /// Every dispatch task stopped within the grace period.
    AllStoppedWithinGrace,

    /// Grace period exceeded; stuck dispatch tasks were aborted.
    ///
    /// Sets `reason` (stuck topics).
    GraceExceeded,
}

/// Client event with optional metadata.
///
/// - `seq`: monotonic process-wide sequence
/// - `at`: wall-clock timestamp
/// - other fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Topic (pattern or effective topic), if applicable.
    pub topic: Option<Arc<str>>,
    /// Error text, if applicable.
    pub error: Option<Arc<str>>,
    /// Short machine-friendly reason.
    pub reason: Option<Arc<str>>,
    /// Connect attempt number (1-based).
    pub attempt: Option<u32>,
    /// Delay before the next attempt.
    pub delay: Option<Duration>,
}

impl Event {
    /// Creates an event of the given kind stamped with the current time and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            topic: None,
            error: None,
            reason: None,
            attempt: None,
            delay: None,
        }
    }

    /// Attaches a topic.
    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches error text.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a retry delay.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Creates an observer overflow event.
    #[inline]
    pub fn observer_overflow(observer: &'static str, cause: &'static str) -> Self {
        Event::now(EventKind::ObserverOverflow).with_reason(format!("observer={observer} cause={cause}"))
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        Event::now(EventKind::ObserverPanicked)
            .with_reason(observer)
            .with_error(info)
    }
}
