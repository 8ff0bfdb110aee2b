//! # Transport provider seam.
//!
//! The client never speaks a wire protocol itself. Everything that touches the
//! network goes through a [`Transport`]: connect, disconnect, publish,
//! subscribe, unsubscribe and request/response.
//!
//! ```text
//! Client ──► Transport::connect(&BusConfig)       (broker, ClientId, credentials, Qos)
//! Client ──► Transport::subscribe([TopicChannel{pattern, sender}], ErrorSink)
//!               │
//!               ├─► pushes MessageEnvelope (received_topic set) into sender
//!               └─► reports async failures through ErrorSink
//! ```
//!
//! A provider must:
//! - reject a subscribe batch atomically (any bad pattern → nothing registered);
//! - set `received_topic` when delivering a wildcard match;
//! - match request responses by correlation id.
//!
//! [`MemoryTransport`] is an in-process provider for tests and demos
//! (feature `memory`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::BusConfig;
use crate::core::ErrorSink;
use crate::error::TransportError;
use crate::message::MessageEnvelope;

#[cfg(any(test, feature = "memory"))]
mod memory;
#[cfg(any(test, feature = "memory"))]
mod topic;

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryTransport;
#[cfg(any(test, feature = "memory"))]
pub use topic::{topic_matches, validate_pattern};

/// Shared handle to a transport provider.
pub type TransportRef = Arc<dyn Transport>;

/// One subscribed pattern and the channel its messages are pushed into.
#[derive(Clone, Debug)]
pub struct TopicChannel {
    /// Subscribed pattern (may contain wildcards).
    pub topic: String,
    /// Delivery channel; bounded, so a slow handler backpressures the provider.
    pub messages: mpsc::Sender<MessageEnvelope>,
}

impl TopicChannel {
    /// Pairs `topic` with its delivery sender.
    pub fn new(topic: impl Into<String>, messages: mpsc::Sender<MessageEnvelope>) -> Self {
        Self {
            topic: topic.into(),
            messages,
        }
    }
}

/// # Messaging transport provider.
///
/// Implementations wrap a concrete messaging library (MQTT, NATS, ...).
/// The client serializes `connect`/`disconnect` and never calls them twice in a
/// row, so implementations need not be idempotent.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens the connection to the broker described by `cfg`.
    ///
    /// `cfg.optional` holds `ClientId`, plus `Username`/`Password` when set and
    /// `Qos` when greater than zero.
    async fn connect(&self, cfg: &BusConfig) -> Result<(), TransportError>;

    /// Closes the connection to the broker.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Publishes `envelope` on `topic`.
    ///
    /// Returns once the provider accepted the message, not once delivered.
    async fn publish(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), TransportError>;

    /// Publishes raw bytes on `topic` without an envelope.
    async fn publish_binary(&self, data: Bytes, topic: &str) -> Result<(), TransportError>;

    /// Registers all `topics` in one batch.
    ///
    /// `errors` receives asynchronous failures observed after this call returned.
    async fn subscribe(
        &self,
        topics: Vec<TopicChannel>,
        errors: ErrorSink,
    ) -> Result<(), TransportError>;

    /// Unregisters `topics`; unknown patterns are ignored.
    async fn unsubscribe(&self, topics: &[String]) -> Result<(), TransportError>;

    /// Publishes `envelope` on `request_topic` and waits for the response
    /// carrying the same correlation id under `response_topic_prefix`.
    async fn request(
        &self,
        envelope: MessageEnvelope,
        request_topic: &str,
        response_topic_prefix: &str,
        timeout: Duration,
    ) -> Result<MessageEnvelope, TransportError>;
}
