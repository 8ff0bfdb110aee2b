//! # In-process transport.
//!
//! [`MemoryTransport`] routes messages between subscriptions of the same
//! process. It behaves like a broker with MQTT topic rules and adds knobs for
//! tests: call counters, forced connect/disconnect failures, raw delivery and
//! asynchronous error injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use super::topic::{topic_matches, validate_pattern};
use super::{TopicChannel, Transport};
use crate::config::BusConfig;
use crate::core::ErrorSink;
use crate::error::TransportError;
use crate::message::{MessageEnvelope, new_correlation_id};

#[derive(Default)]
struct State {
    connected: bool,
    config: Option<BusConfig>,
    channels: Vec<TopicChannel>,
    errors: Option<ErrorSink>,
    waiters: HashMap<String, oneshot::Sender<MessageEnvelope>>,
}

/// In-memory broker implementing [`Transport`].
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    failing_connects: AtomicUsize,
    fail_disconnect: AtomicBool,
    published: AtomicUsize,
}

impl MemoryTransport {
    /// Creates a disconnected transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connect calls fail with an I/O error.
    pub fn fail_next_connects(&self, n: usize) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Makes every disconnect call fail after releasing the connection.
    pub fn fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Number of `connect` calls received.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls received.
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Number of messages accepted by `publish`/`publish_binary`.
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    /// True while connected.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Configuration received by the last successful `connect`.
    pub fn bus_config(&self) -> Option<BusConfig> {
        self.lock().config.clone()
    }

    /// Patterns currently registered, in subscription order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().channels.iter().map(|c| c.topic.clone()).collect()
    }

    /// Reports `err` through the error sink of the last subscribe call.
    ///
    /// Returns `false` if nothing subscribed yet or the sink dropped it.
    pub fn inject_error(&self, err: TransportError) -> bool {
        let sink = self.lock().errors.clone();
        sink.is_some_and(|s| s.report(err))
    }

    /// Pushes `envelope` unchanged to the channels registered with exactly
    /// `pattern`, bypassing topic matching and `received_topic` stamping.
    ///
    /// Returns the number of channels that accepted it.
    pub async fn inject(&self, pattern: &str, envelope: MessageEnvelope) -> usize {
        let senders: Vec<_> = self
            .lock()
            .channels
            .iter()
            .filter(|c| c.topic == pattern)
            .map(|c| c.messages.clone())
            .collect();

        let mut delivered = 0;
        for tx in senders {
            if tx.send(envelope.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn route(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), TransportError> {
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(TransportError::InvalidTopic {
                topic: topic.to_string(),
                reason: "publish topic must be concrete".to_string(),
            });
        }

        let (waiter, senders) = {
            let mut state = self.lock();
            if !state.connected {
                return Err(TransportError::Unavailable);
            }
            let waiter = state.waiters.remove(topic);
            let senders: Vec<mpsc::Sender<MessageEnvelope>> = state
                .channels
                .iter()
                .filter(|c| topic_matches(&c.topic, topic))
                .map(|c| c.messages.clone())
                .collect();
            (waiter, senders)
        };
        self.published.fetch_add(1, Ordering::SeqCst);

        let envelope = envelope.with_received_topic(topic);
        if let Some(waiter) = waiter {
            let _ = waiter.send(envelope.clone());
        }

        trace!(topic, matches = senders.len(), "routing message");
        for tx in senders {
            // A closed channel means the subscriber is already gone.
            let _ = tx.send(envelope.clone()).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, cfg: &BusConfig) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Io {
                error: "connection refused".to_string(),
            });
        }
        {
            let mut state = self.lock();
            state.connected = true;
            state.config = Some(cfg.clone());
        }
        debug!(broker = %cfg.broker.url(), "memory transport connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.lock();
            state.connected = false;
            state.channels.clear();
            state.waiters.clear();
            state.errors = None;
        }
        debug!("memory transport disconnected");
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(TransportError::Io {
                error: "broken pipe".to_string(),
            });
        }
        Ok(())
    }

    async fn publish(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), TransportError> {
        self.route(envelope, topic).await
    }

    async fn publish_binary(&self, data: Bytes, topic: &str) -> Result<(), TransportError> {
        self.route(MessageEnvelope::new(new_correlation_id(), data), topic)
            .await
    }

    async fn subscribe(
        &self,
        topics: Vec<TopicChannel>,
        errors: ErrorSink,
    ) -> Result<(), TransportError> {
        for t in &topics {
            validate_pattern(&t.topic)?;
        }

        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::Unavailable);
        }
        state.channels.extend(topics);
        state.errors = Some(errors);
        Ok(())
    }

    async fn unsubscribe(&self, topics: &[String]) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::Unavailable);
        }
        state.channels.retain(|c| !topics.contains(&c.topic));
        Ok(())
    }

    async fn request(
        &self,
        envelope: MessageEnvelope,
        request_topic: &str,
        response_topic_prefix: &str,
        timeout: Duration,
    ) -> Result<MessageEnvelope, TransportError> {
        let response_topic = format!("{response_topic_prefix}/{}", envelope.correlation_id);
        let (tx, rx) = oneshot::channel();
        self.lock().waiters.insert(response_topic.clone(), tx);

        if let Err(e) = self.route(envelope, request_topic).await {
            self.lock().waiters.remove(&response_topic);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Unavailable),
            Err(_) => {
                self.lock().waiters.remove(&response_topic);
                Err(TransportError::Timeout { timeout })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::core::{ErrorReceiver, error_channel};
    use crate::events::Bus;

    fn bus() -> BusConfig {
        ClientConfig::default().to_bus_config()
    }

    fn sink() -> (ErrorSink, ErrorReceiver) {
        error_channel(4, Bus::new(8))
    }

    #[tokio::test]
    async fn test_publish_reaches_wildcard_subscriber_with_received_topic() {
        let t = MemoryTransport::new();
        t.connect(&bus()).await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let (errors, _keep) = sink();
        t.subscribe(vec![TopicChannel::new("edgex/events/#", tx)], errors)
            .await
            .unwrap();

        t.publish(MessageEnvelope::new("id", "x"), "edgex/events/device/sensor01")
            .await
            .unwrap();

        let got = rx.recv().await.unwrap();
        assert_eq!(
            got.received_topic.as_deref(),
            Some("edgex/events/device/sensor01")
        );
        assert_eq!(t.published_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pattern_rejects_whole_batch() {
        let t = MemoryTransport::new();
        t.connect(&bus()).await.unwrap();

        let (a, _ra) = mpsc::channel(1);
        let (b, _rb) = mpsc::channel(1);
        let err = t
            .subscribe(
                vec![TopicChannel::new("ok/topic", a), TopicChannel::new("bad/#/x", b)],
                sink().0,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InvalidTopic { .. }));
        assert!(t.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let t = MemoryTransport::new();
        let err = t.publish(MessageEnvelope::new("i", "p"), "a").await.unwrap_err();
        assert_eq!(err, TransportError::Unavailable);
    }

    #[tokio::test]
    async fn test_failing_connects_are_counted_down() {
        let t = MemoryTransport::new();
        t.fail_next_connects(2);
        assert!(t.connect(&bus()).await.is_err());
        assert!(t.connect(&bus()).await.is_err());
        assert!(t.connect(&bus()).await.is_ok());
        assert_eq!(t.connect_calls(), 3);
        assert!(t.is_connected());
        assert_eq!(t.bus_config(), Some(bus()));
    }

    #[tokio::test]
    async fn test_request_times_out_without_responder() {
        let t = MemoryTransport::new();
        t.connect(&bus()).await.unwrap();

        let err = t
            .request(
                MessageEnvelope::new("req-1", "ping"),
                "svc/req",
                "svc/resp",
                Duration::from_millis(20),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_inject_error_requires_subscription() {
        let t = MemoryTransport::new();
        t.connect(&bus()).await.unwrap();
        assert!(!t.inject_error(TransportError::Unavailable));

        let (tx, _rx) = mpsc::channel(1);
        let (errors, receiver) = sink();
        t.subscribe(vec![TopicChannel::new("a", tx)], errors)
            .await
            .unwrap();
        assert!(t.inject_error(TransportError::Unavailable));
        assert_eq!(receiver.try_recv(), Some(TransportError::Unavailable));
    }
}
