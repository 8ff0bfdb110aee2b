//! # LogWriter: renders client events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  messagebus: connected
//! INFO  messagebus: subscribed topic=edgex/events/#
//! WARN  messagebus: handler failed topic=edgex/events/device/s1 error=bad reading
//! WARN  messagebus: async transport error topic=edgex/events/# error=i/o error: reset
//! INFO  messagebus: disconnected
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::observers::Observer;

/// Event writer observer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Observer for LogWriter {
    async fn on_event(&self, e: &Event) {
        let topic = e.topic.as_deref().unwrap_or("-");
        let err = e.error.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::Connected => info!(seq = e.seq, "connected"),
            EventKind::ConnectRetryScheduled => warn!(
                seq = e.seq,
                attempt = e.attempt.unwrap_or(0),
                delay = ?e.delay,
                error = err,
                "connect failed, retry scheduled"
            ),
            EventKind::Disconnected => info!(seq = e.seq, "disconnected"),
            EventKind::Subscribed => info!(seq = e.seq, topic, "subscribed"),
            EventKind::Unsubscribed => info!(seq = e.seq, topic, "unsubscribed"),
            EventKind::DispatchStarted => debug!(seq = e.seq, topic, "dispatch started"),
            EventKind::DispatchStopped => debug!(seq = e.seq, topic, reason, "dispatch stopped"),
            EventKind::HandlerFailed => warn!(seq = e.seq, topic, error = err, "handler failed"),
            EventKind::HandlerPanicked => {
                error!(seq = e.seq, topic, error = err, "handler panicked")
            }
            EventKind::AsyncError => {
                warn!(seq = e.seq, topic, error = err, "async transport error")
            }
            EventKind::ErrorDropped => {
                warn!(seq = e.seq, reason, error = err, "async error dropped")
            }
            EventKind::ObserverOverflow => warn!(seq = e.seq, reason, "observer overflow"),
            EventKind::ObserverPanicked => {
                error!(seq = e.seq, observer = reason, error = err, "observer panicked")
            }
            EventKind::ShutdownRequested => info!(seq = e.seq, "shutdown requested"),
            EventKind::AllStoppedWithinGrace => info!(seq = e.seq, "all dispatch tasks stopped"),
            EventKind::GraceExceeded => error!(seq = e.seq, stuck = reason, "grace exceeded"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
