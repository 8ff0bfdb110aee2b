//! # Non-blocking event fan-out to observers.
//!
//! [`ObserverSet`] hands every event to each observer through its own bounded
//! queue and worker task.
//!
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► observer1.on_event()
//!     │                      └──────► panic → ObserverPanicked
//!     └──► [queue N] ──► worker N ──► observerN.on_event()
//! ```
//!
//! ## Rules
//! - `emit()` returns immediately (`try_send`)
//! - Per-observer FIFO; no ordering across observers
//! - Full or closed queue: event dropped for that observer, `ObserverOverflow` published
//! - A panicking observer is isolated; its worker keeps going

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};
use crate::observers::Observer;

struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for event observers.
pub struct ObserverSet {
    channels: Vec<ObserverChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl ObserverSet {
    /// Creates the set and spawns one worker per observer.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observer>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for observer in observers {
            let name = observer.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(observer.queue_capacity().max(1));
            let worker_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = observer.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        worker_bus.publish(Event::observer_panicked(
                            observer.name(),
                            panic_message(panic.as_ref()),
                        ));
                    }
                }
            });
            channels.push(ObserverChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits an event to all observers without waiting for them.
    ///
    /// Overflow events are not re-reported when they overflow themselves.
    pub fn emit(&self, event: Event) {
        let loops_back = matches!(
            event.kind,
            EventKind::ObserverOverflow | EventKind::ObserverPanicked
        );
        let event = Arc::new(event);

        for channel in &self.channels {
            let cause = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !loops_back {
                self.bus.publish(Event::observer_overflow(channel.name, cause));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Observer for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploder;

    #[async_trait]
    impl Observer for Exploder {
        async fn on_event(&self, _event: &Event) {
            panic!("observer blew up");
        }

        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    #[tokio::test]
    async fn test_every_observer_receives_in_order() {
        let bus = Bus::new(16);
        let rec = Arc::new(Recorder::default());
        let set = ObserverSet::new(vec![rec.clone() as Arc<dyn Observer>], bus);

        set.emit(Event::now(EventKind::Connected));
        set.emit(Event::now(EventKind::Subscribed));
        set.emit(Event::now(EventKind::Disconnected));
        set.shutdown().await;

        assert_eq!(
            *rec.kinds.lock().unwrap(),
            vec![
                EventKind::Connected,
                EventKind::Subscribed,
                EventKind::Disconnected
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_observer_is_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let rec = Arc::new(Recorder::default());
        let set = ObserverSet::new(
            vec![Arc::new(Exploder) as Arc<dyn Observer>, rec.clone()],
            bus,
        );

        set.emit(Event::now(EventKind::Connected));
        let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, EventKind::ObserverPanicked);
        assert_eq!(ev.reason.as_deref(), Some("exploder"));
        assert_eq!(ev.error.as_deref(), Some("observer blew up"));

        set.shutdown().await;
        assert_eq!(*rec.kinds.lock().unwrap(), vec![EventKind::Connected]);
    }
}
