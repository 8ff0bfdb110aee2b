//! # Dispatcher: one task per subscribed pattern.
//!
//! Drains the pattern's delivery channel and invokes the handler, one message
//! at a time, in arrival order.
//!
//! ```text
//! loop select! {
//!   ├─► messages.recv()  → Some(env) → handler(effective_topic, env)
//!   │                          ├─► Err   → HandlerFailed, continue
//!   │                          └─► panic → HandlerPanicked, continue
//!   │                    → None      → exit (channel_closed)
//!   ├─► errors.recv()    → log + AsyncError, continue
//!   └─► token.cancelled() → exit (unsubscribed | shutdown)
//! }
//! publish DispatchStopped
//! ```
//!
//! ## Rules
//! - A failing or panicking handler never ends the subscription.
//! - Cancellation is observed between messages; a handler call in progress
//!   runs to completion (or is aborted by the shutdown grace).
//! - The three sources have no priority over each other.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::errors::ErrorReceiver;
use crate::error::ClientError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;
use crate::message::MessageEnvelope;
use crate::observers::panic_message;

/// Everything a dispatch task owns.
pub(crate) struct Dispatcher {
    pub(crate) pattern: Arc<str>,
    pub(crate) handler: HandlerRef,
    pub(crate) messages: mpsc::Receiver<MessageEnvelope>,
    pub(crate) errors: ErrorReceiver,
    pub(crate) bus: Bus,
    /// Per-subscription token (child of `shutdown`).
    pub(crate) token: CancellationToken,
    pub(crate) shutdown: CancellationToken,
}

impl Dispatcher {
    /// Runs until the channel closes or the token fires.
    pub(crate) async fn run(mut self) {
        self.bus
            .publish(Event::now(EventKind::DispatchStarted).with_topic(Arc::clone(&self.pattern)));
        debug!(topic = %self.pattern, handler = self.handler.name(), "dispatch started");

        let reason = loop {
            select! {
                msg = self.messages.recv() => match msg {
                    Some(envelope) => self.deliver(envelope).await,
                    None => break "channel_closed",
                },
                Some(err) = self.errors.recv() => {
                    warn!(topic = %self.pattern, error = %err, "async transport error");
                    self.bus.publish(
                        Event::now(EventKind::AsyncError)
                            .with_topic(Arc::clone(&self.pattern))
                            .with_error(err.as_message()),
                    );
                }
                _ = self.token.cancelled() => {
                    break if self.shutdown.is_cancelled() { "shutdown" } else { "unsubscribed" };
                }
            }
        };

        debug!(topic = %self.pattern, reason, "dispatch stopped");
        self.bus.publish(
            Event::now(EventKind::DispatchStopped)
                .with_topic(Arc::clone(&self.pattern))
                .with_reason(reason),
        );
    }

    async fn deliver(&self, envelope: MessageEnvelope) {
        let topic = envelope.effective_topic(&self.pattern).to_string();
        let fut = self.handler.handle(&topic, envelope);

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                let err = ClientError::Handler {
                    topic: topic.clone(),
                    source,
                };
                warn!(topic = %topic, pattern = %self.pattern, error = %err.as_message(), "handler failed");
                self.bus.publish(
                    Event::now(EventKind::HandlerFailed)
                        .with_topic(topic)
                        .with_error(err.as_message()),
                );
            }
            Err(panic) => {
                let info = panic_message(panic.as_ref());
                error!(topic = %topic, pattern = %self.pattern, panic = %info, "handler panicked");
                self.bus.publish(
                    Event::now(EventKind::HandlerPanicked)
                        .with_topic(topic)
                        .with_error(info),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::error_channel;
    use crate::error::{HandlerError, TransportError};
    use crate::handlers::HandlerFn;
    use std::sync::Mutex;

    struct Harness {
        tx: mpsc::Sender<MessageEnvelope>,
        bus: Bus,
        token: CancellationToken,
        shutdown: CancellationToken,
        sink: crate::core::ErrorSink,
    }

    fn spawn(pattern: &str, handler: HandlerRef) -> (Harness, tokio::task::JoinHandle<()>) {
        let bus = Bus::new(64);
        let (sink, errors) = error_channel(4, bus.clone());
        let (tx, messages) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let token = shutdown.child_token();
        let d = Dispatcher {
            pattern: Arc::from(pattern),
            handler,
            messages,
            errors,
            bus: bus.clone(),
            token: token.clone(),
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(d.run());
        (
            Harness {
                tx,
                bus,
                token,
                shutdown,
                sink,
            },
            task,
        )
    }

    fn recorder() -> (HandlerRef, Arc<Mutex<Vec<(String, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let h = HandlerFn::arc(move |topic: String, env: MessageEnvelope| {
            let sink = Arc::clone(&sink);
            async move {
                let body = env.payload_str()?.to_string();
                sink.lock().unwrap().push((topic, body.clone()));
                if body == "bad" {
                    return Err(HandlerError::fail("bad payload"));
                }
                if body == "boom" {
                    panic!("exploded");
                }
                Ok::<(), HandlerError>(())
            }
        });
        (h, seen)
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_delivery() {
        let (h, seen) = recorder();
        let (harness, task) = spawn("a/b", h);
        let mut events = harness.bus.subscribe();

        for body in ["one", "bad", "boom", "two"] {
            harness.tx.send(MessageEnvelope::new("id", body)).await.unwrap();
        }
        drop(harness.tx);
        task.await.unwrap();

        let bodies: Vec<String> = seen.lock().unwrap().iter().map(|(_, b)| b.clone()).collect();
        assert_eq!(bodies, vec!["one", "bad", "boom", "two"]);

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::HandlerFailed));
        assert!(kinds.contains(&EventKind::HandlerPanicked));
        assert_eq!(kinds.last(), Some(&EventKind::DispatchStopped));
    }

    #[tokio::test]
    async fn test_effective_topic_resolution() {
        let (h, seen) = recorder();
        let (harness, task) = spawn("edgex/events/#", h);

        harness.tx.send(MessageEnvelope::new("1", "x")).await.unwrap();
        harness
            .tx
            .send(
                MessageEnvelope::new("2", "y").with_received_topic("edgex/events/device/sensor01"),
            )
            .await
            .unwrap();
        drop(harness.tx);
        task.await.unwrap();

        let topics: Vec<String> = seen.lock().unwrap().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(topics, vec!["edgex/events/#", "edgex/events/device/sensor01"]);
    }

    #[tokio::test]
    async fn test_exit_reason_distinguishes_unsubscribe_from_shutdown() {
        let (h, _) = recorder();
        let (harness, task) = spawn("a", h);
        let mut events = harness.bus.subscribe();
        harness.token.cancel();
        task.await.unwrap();
        let last = std::iter::from_fn(|| events.try_recv().ok()).last().unwrap();
        assert_eq!(last.reason.as_deref(), Some("unsubscribed"));

        let (h, _) = recorder();
        let (harness, task) = spawn("b", h);
        let mut events = harness.bus.subscribe();
        harness.shutdown.cancel();
        task.await.unwrap();
        let last = std::iter::from_fn(|| events.try_recv().ok()).last().unwrap();
        assert_eq!(last.reason.as_deref(), Some("shutdown"));
    }

    #[tokio::test]
    async fn test_async_errors_are_published_and_loop_continues() {
        let (h, seen) = recorder();
        let (harness, task) = spawn("a", h);
        let mut events = harness.bus.subscribe();

        assert!(harness.sink.report(TransportError::Unavailable));
        let ev = loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::AsyncError {
                break ev;
            }
        };
        assert_eq!(ev.topic.as_deref(), Some("a"));

        harness.tx.send(MessageEnvelope::new("1", "after")).await.unwrap();
        drop(harness.tx);
        task.await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
