//! # Shared asynchronous error channel.
//!
//! One bounded MPSC queue per client carries errors the transport reports
//! after a successful subscribe (connection drops, delivery failures, ...).
//!
//! ```text
//! provider task ──► ErrorSink::report ──► [bounded queue] ──► ErrorReceiver
//!   (many producers, never blocks)                            ├─► dispatch task 1 (log + AsyncError)
//!                                                             ├─► dispatch task N
//!                                                             └─► caller (Client::error_channel)
//! ```
//!
//! ## Rules
//! - `report()` never blocks: a full queue drops the error (warn + `ErrorDropped`).
//! - Consumers compete: each error is taken by exactly one of them.
//! - Backlog is bounded by the capacity; the client never crashes on it.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use crate::error::TransportError;
use crate::events::{Bus, Event, EventKind};

/// Creates the producer and consumer halves of an error channel.
pub(crate) fn error_channel(capacity: usize, bus: Bus) -> (ErrorSink, ErrorReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = ErrorSink { tx, bus };
    let receiver = ErrorReceiver {
        rx: Arc::new(Mutex::new(rx)),
        probe: sink.tx.clone(),
    };
    (sink, receiver)
}

/// Producer half handed to the transport provider.
#[derive(Clone, Debug)]
pub struct ErrorSink {
    tx: mpsc::Sender<TransportError>,
    bus: Bus,
}

impl ErrorSink {
    /// Queues `err` for asynchronous delivery.
    ///
    /// Returns `false` when the error was dropped (queue full or closed).
    pub fn report(&self, err: TransportError) -> bool {
        let (cause, dropped) = match self.tx.try_send(err) {
            Ok(()) => return true,
            Err(mpsc::error::TrySendError::Full(e)) => ("full", e),
            Err(mpsc::error::TrySendError::Closed(e)) => ("closed", e),
        };
        warn!(cause, error = %dropped, "async transport error dropped");
        self.bus.publish(
            Event::now(EventKind::ErrorDropped)
                .with_reason(cause)
                .with_error(dropped.to_string()),
        );
        false
    }

    /// Number of queued, not yet consumed errors.
    pub fn backlog(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consumer half; cloneable, clones share the same queue.
#[derive(Clone, Debug)]
pub struct ErrorReceiver {
    rx: Arc<Mutex<mpsc::Receiver<TransportError>>>,
    probe: mpsc::Sender<TransportError>,
}

impl ErrorReceiver {
    /// Waits for the next error.
    ///
    /// Returns `None` only once every producer is gone, which cannot happen while
    /// the client is alive.
    pub async fn recv(&self) -> Option<TransportError> {
        self.rx.lock().await.recv().await
    }

    /// Takes an error if one is queued and no other consumer holds the queue.
    pub fn try_recv(&self) -> Option<TransportError> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Number of queued errors.
    pub fn len(&self) -> usize {
        self.probe.max_capacity() - self.probe.capacity()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
