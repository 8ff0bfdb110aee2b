//! # Event bus for client events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that every part of the client
//! (connection guard, dispatch tasks, error sink, shutdown) can publish without
//! blocking, and any number of listeners can observe.
//!
//! ```text
//! Publishers:                      Receivers:
//!   Client ops   ──┐
//!   dispatch N   ──┼──► Bus ──┬──► observer listener ──► ObserverSet
//!   ErrorSink    ──┤          └──► Client::events() (caller)
//!   shutdown     ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks; with no receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - A receiver that falls behind observes `RecvError::Lagged(n)` and skips `n` events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for client events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` undelivered events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every live receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// New receiver observing events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_every_receiver() {
        let bus = Bus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(Event::now(EventKind::Connected));

        assert_eq!(a.recv().await.unwrap().kind, EventKind::Connected);
        assert_eq!(b.recv().await.unwrap().kind, EventKind::Connected);
        assert_eq!(bus.receiver_count(), 2);
    }

    #[test]
    fn test_publish_without_receivers_is_noop() {
        let bus = Bus::new(0);
        bus.publish(Event::now(EventKind::Disconnected));
        assert_eq!(bus.receiver_count(), 0);
    }
}
