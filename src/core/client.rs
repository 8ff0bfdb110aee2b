//! # Client: connection guard, subscription fan-out and shutdown.
//!
//! ```text
//! subscribe(topics, handler)
//!   ├─► lifecycle lock, connected?, none already registered?
//!   ├─► one bounded channel per pattern
//!   ├─► transport.subscribe([TopicChannel], ErrorSink)   (one batch, all or nothing)
//!   └─► spawn Dispatcher per pattern, token = shutdown.child_token()
//!
//! disconnect()
//!   ├─► phase = Closing, drain task handles          (lifecycle lock released)
//!   ├─► shutdown.cancel()                            (every dispatcher sees it)
//!   ├─► join_with_grace(tasks, cfg.grace)            (abort stuck on overrun)
//!   ├─► inflight.write()                             (publishes/requests finished)
//!   ├─► transport.disconnect()                       (exactly once)
//!   └─► phase = Closed, Disconnected event, closed.cancel()
//! ```
//!
//! ## Rules
//! - `connect`/`disconnect`/`subscribe`/`unsubscribe` are serialized by an async
//!   lifecycle mutex.
//! - `publish*` and `request` hold the in-flight read lock from the connected
//!   check until the transport returns, so they either complete on a live
//!   transport or fail with `NotConnected`. A pending `request` delays
//!   `disconnect` up to its timeout.
//! - Operations on a non-connected client fail with `NotConnected` before the
//!   transport is touched.
//! - A closed client cannot reconnect.
//! - Handlers may publish, subscribe and unsubscribe (even their own pattern).
//! - A handler may call `disconnect`; its own dispatch task is not joined.
//! - A `disconnect` that finds another one in progress waits until the
//!   transport is released, unless it runs inside a dispatch task being joined.
//!
//! ## Example
//! ```rust
//! # #[cfg(feature = "memory")]
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), messagebus::ClientError> {
//! use std::sync::Arc;
//! use messagebus::{Client, ClientConfig, HandlerError, HandlerFn, MemoryTransport, MessageEnvelope};
//!
//! let client = Client::new(ClientConfig::default(), Arc::new(MemoryTransport::new()))?;
//! client.connect().await?;
//!
//! let handler = HandlerFn::arc(|topic: String, env: MessageEnvelope| async move {
//!     println!("{topic}: {}", env.payload_str()?);
//!     Ok::<_, HandlerError>(())
//! });
//! client.subscribe_single("edgex/events/#", handler).await?;
//! client.publish("edgex/events/device/sensor01", "21.5").await?;
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "memory"))]
//! # fn main() {}
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{self, Mutex, broadcast, mpsc};
use tokio::{select, task, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::ClientBuilder;
use super::dispatch::Dispatcher;
use super::errors::{ErrorReceiver, ErrorSink};
use super::registry::{Phase, Registry, Subscription};
use super::shutdown::join_with_grace;
use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;
use crate::message::{MessageEnvelope, Payload, create_envelope};
use crate::policies::RetryPolicy;
use crate::transport::{TopicChannel, TransportRef};

/// Diagnostic snapshot returned by [`Client::client_info`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Connection state.
    pub connected: bool,
    /// Number of active subscriptions.
    pub subscribed_topics: usize,
    /// Asynchronous errors waiting in the error channel.
    pub error_channel_buffer: usize,
    /// Dispatch tasks still running.
    pub dispatch_tasks: usize,
}

impl ClientInfo {
    /// Flattens the snapshot into a key/value map.
    pub fn to_map(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([
            ("connected".to_string(), self.connected.into()),
            ("subscribedTopics".to_string(), self.subscribed_topics.into()),
            (
                "errorChannelBuffer".to_string(),
                self.error_channel_buffer.into(),
            ),
            ("dispatchTasks".to_string(), self.dispatch_tasks.into()),
        ])
    }
}

/// MessageBus client owning one transport connection.
pub struct Client {
    pub(crate) cfg: ClientConfig,
    pub(crate) transport: TransportRef,
    pub(crate) bus: Bus,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) lifecycle: Mutex<()>,
    /// Shared by publishers and requests, taken exclusively before the transport is released.
    pub(crate) inflight: sync::RwLock<()>,
    pub(crate) errors: ErrorSink,
    pub(crate) error_rx: ErrorReceiver,
    /// Parent of every subscription token.
    pub(crate) shutdown: CancellationToken,
    /// Fired once the phase reaches `Closed`.
    pub(crate) closed: CancellationToken,
    /// Fired on drop; stops the observer listener.
    pub(crate) dropped: CancellationToken,
}

impl Client {
    /// Creates a disconnected client without observers.
    pub fn new(cfg: ClientConfig, transport: TransportRef) -> Result<Self, ClientError> {
        ClientBuilder::new(cfg).build(transport)
    }

    /// Returns a builder for a client with observers.
    pub fn builder(cfg: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(cfg)
    }

    /// Configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    /// Subscribes to client events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    // ---- connection guard ----

    /// Connects the transport. No-op if already connected.
    ///
    /// Fails with [`ClientError::Closed`] after [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _guard = self.lifecycle.lock().await;
        match self.read().phase {
            Phase::Connected => return Ok(()),
            Phase::Closing | Phase::Closed => return Err(ClientError::Closed),
            Phase::Disconnected => {}
        }

        let bus_cfg = self.cfg.to_bus_config();
        let broker = bus_cfg.broker.url();
        self.transport
            .connect(&bus_cfg)
            .await
            .map_err(|e| ClientError::transport("connect", e))?;
        self.write().phase = Phase::Connected;

        info!(broker = %broker, client_id = %self.cfg.client_id, "connected");
        self.bus
            .publish(Event::now(EventKind::Connected).with_reason(broker));
        Ok(())
    }

    /// Connects, retrying failures according to `policy`.
    ///
    /// Returns the last error once the attempts are exhausted.
    pub async fn connect_with_retry(&self, policy: &RetryPolicy) -> Result<(), ClientError> {
        let mut failed: u32 = 0;
        loop {
            let err = match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e @ ClientError::Closed) => return Err(e),
                Err(e) => e,
            };

            failed = failed.saturating_add(1);
            if !policy.allows(failed) {
                warn!(attempts = failed, error = %err.as_message(), "giving up connecting");
                return Err(err);
            }

            let delay = policy.delay(failed);
            warn!(attempt = failed, ?delay, error = %err.as_message(), "connect failed, retrying");
            self.bus.publish(
                Event::now(EventKind::ConnectRetryScheduled)
                    .with_attempt(failed)
                    .with_delay(delay)
                    .with_error(err.as_message()),
            );

            select! {
                _ = time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return Err(ClientError::Closed),
            }
        }
    }

    /// Stops every dispatch task, then releases the transport.
    ///
    /// No-op unless connected. If another `disconnect` is in progress, waits for
    /// it to release the transport; called from a handler it returns at once.
    /// On grace overrun the stuck tasks are aborted, the transport is still
    /// released and [`ClientError::GraceExceeded`] is returned.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let current = task::try_id();
        let tasks = {
            let _guard = self.lifecycle.lock().await;
            let mut reg = self.write();
            match reg.phase {
                Phase::Connected => {
                    reg.phase = Phase::Closing;
                    Some(reg.drain())
                }
                Phase::Closing if !reg.is_draining(current) => None,
                _ => return Ok(()),
            }
        };
        let Some(tasks) = tasks else {
            self.closed.cancelled().await;
            return Ok(());
        };

        // A handler calling disconnect must not join the task it runs in.
        let (own, tasks): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .partition(|(_, t)| Some(t.id()) == current);
        if let Some((topic, _)) = own.first() {
            debug!(topic = %topic, "disconnect called from a handler");
        }

        info!(tasks = tasks.len(), "disconnecting");
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        self.shutdown.cancel();

        let joined = join_with_grace(tasks, self.cfg.shutdown_grace(), &self.bus).await;
        let released = {
            let drained = match self.cfg.shutdown_grace() {
                Some(grace) => time::timeout(grace, self.inflight.write()).await.ok(),
                None => Some(self.inflight.write().await),
            };
            if drained.is_none() {
                warn!("publishes still in flight after grace, releasing transport");
            }
            self.transport.disconnect().await
        };

        self.write().close();
        self.closed.cancel();
        info!("disconnected");
        self.bus.publish(Event::now(EventKind::Disconnected));

        match (joined, released) {
            (Err(grace), Err(e)) => {
                warn!(error = %e, "transport disconnect failed");
                Err(grace)
            }
            (Err(grace), Ok(())) => Err(grace),
            (Ok(()), released) => released.map_err(|e| ClientError::transport("disconnect", e)),
        }
    }

    /// True while connected.
    pub fn is_connected(&self) -> bool {
        self.read().is_connected()
    }

    /// Fails with [`ClientError::NotConnected`] unless connected.
    pub fn health_check(&self) -> Result<(), ClientError> {
        self.ensure_connected()
    }

    // ---- publishing ----

    /// Publishes `data` on `topic` with a generated correlation id.
    pub async fn publish(&self, topic: &str, data: impl Into<Payload>) -> Result<(), ClientError> {
        self.publish_with_correlation_id(topic, data, "").await
    }

    /// Publishes `data` on `topic` with `correlation_id` (generated if empty).
    pub async fn publish_with_correlation_id(
        &self,
        topic: &str,
        data: impl Into<Payload>,
        correlation_id: &str,
    ) -> Result<(), ClientError> {
        let envelope = create_envelope(data, correlation_id)?;
        self.send(envelope, topic).await
    }

    /// Publishes raw bytes on `topic` without an envelope.
    pub async fn publish_binary_data(
        &self,
        topic: &str,
        data: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        let _inflight = self.admit().await?;
        self.transport
            .publish_binary(data.into(), topic)
            .await
            .map_err(|e| ClientError::transport("publish", e))
    }

    /// Publishes a prepared envelope on `topic`.
    pub async fn publish_message_envelope(
        &self,
        topic: &str,
        envelope: MessageEnvelope,
    ) -> Result<(), ClientError> {
        self.send(envelope, topic).await
    }

    async fn send(&self, envelope: MessageEnvelope, topic: &str) -> Result<(), ClientError> {
        let _inflight = self.admit().await?;
        debug!(topic, correlation_id = %envelope.correlation_id, "publishing");
        self.transport
            .publish(envelope, topic)
            .await
            .map_err(|e| ClientError::transport("publish", e))
    }

    // ---- subscriptions ----

    /// Subscribes `handler` to every pattern in `topics`.
    ///
    /// All patterns are registered with the transport in one batch; if it
    /// rejects any of them nothing is registered. Already subscribed patterns
    /// are rejected with [`ClientError::AlreadySubscribed`].
    pub async fn subscribe<I, S>(&self, topics: I, handler: HandlerRef) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut patterns: Vec<String> = Vec::new();
        for topic in topics {
            let topic = topic.into();
            if !patterns.contains(&topic) {
                patterns.push(topic);
            }
        }

        let _guard = self.lifecycle.lock().await;
        self.ensure_connected()?;
        if patterns.is_empty() {
            return Ok(());
        }
        if let Some(dup) = patterns.iter().find(|p| self.read().contains(p)) {
            return Err(ClientError::AlreadySubscribed { topic: dup.clone() });
        }

        let capacity = self.cfg.channel_capacity_clamped();
        let mut channels = Vec::with_capacity(patterns.len());
        let mut receivers = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            let (tx, rx) = mpsc::channel(capacity);
            channels.push(TopicChannel::new(pattern.clone(), tx));
            receivers.push(rx);
        }

        if let Err(e) = self.transport.subscribe(channels, self.errors.clone()).await {
            warn!(topics = ?patterns, error = %e, "subscribe rejected");
            return Err(ClientError::transport("subscribe", e));
        }

        let mut reg = self.write();
        for (pattern, messages) in patterns.into_iter().zip(receivers) {
            let token = self.shutdown.child_token();
            let dispatcher = Dispatcher {
                pattern: Arc::from(pattern.as_str()),
                handler: Arc::clone(&handler),
                messages,
                errors: self.error_rx.clone(),
                bus: self.bus.clone(),
                token: token.clone(),
                shutdown: self.shutdown.clone(),
            };
            let task = tokio::spawn(dispatcher.run());

            info!(topic = %pattern, handler = handler.name(), "subscribed");
            self.bus
                .publish(Event::now(EventKind::Subscribed).with_topic(pattern.as_str()));
            reg.insert(pattern, Subscription { token, task });
        }
        Ok(())
    }

    /// Subscribes `handler` to a single pattern.
    pub async fn subscribe_single(
        &self,
        topic: impl Into<String>,
        handler: HandlerRef,
    ) -> Result<(), ClientError> {
        self.subscribe([topic.into()], handler).await
    }

    /// Unsubscribes `topics`; unknown patterns are ignored.
    ///
    /// Does not wait for the dispatch tasks to finish.
    pub async fn unsubscribe<I, S>(&self, topics: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = topics.into_iter().map(Into::into).collect();

        let _guard = self.lifecycle.lock().await;
        self.ensure_connected()?;
        if patterns.is_empty() {
            return Ok(());
        }

        self.transport
            .unsubscribe(&patterns)
            .await
            .map_err(|e| ClientError::transport("unsubscribe", e))?;

        let removed = self.write().retire(&patterns);
        for topic in removed {
            info!(topic = %topic, "unsubscribed");
            self.bus
                .publish(Event::now(EventKind::Unsubscribed).with_topic(topic));
        }
        Ok(())
    }

    /// Active subscription patterns, sorted.
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.read().topics()
    }

    /// Consumer side of the shared asynchronous error channel.
    ///
    /// Dispatch tasks drain the same queue, so each error reaches exactly one
    /// consumer.
    pub fn error_channel(&self) -> ErrorReceiver {
        self.error_rx.clone()
    }

    // ---- request/response ----

    /// Sends `envelope` on `request_topic` and waits for the response with the
    /// same correlation id under `response_topic_prefix`.
    pub async fn request(
        &self,
        envelope: MessageEnvelope,
        request_topic: &str,
        response_topic_prefix: &str,
        timeout: Duration,
    ) -> Result<MessageEnvelope, ClientError> {
        let _inflight = self.admit().await?;
        debug!(request_topic, correlation_id = %envelope.correlation_id, ?timeout, "request");

        let call = self
            .transport
            .request(envelope, request_topic, response_topic_prefix, timeout);
        match time::timeout(timeout, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Timeout { .. })) | Err(_) => {
                warn!(request_topic, ?timeout, "request timed out");
                Err(ClientError::Timeout { timeout })
            }
            Ok(Err(e)) => Err(ClientError::transport("request", e)),
        }
    }

    // ---- helpers ----

    /// Builds an envelope without publishing it.
    pub fn create_message_envelope(
        &self,
        data: impl Into<Payload>,
        correlation_id: &str,
    ) -> Result<MessageEnvelope, ClientError> {
        create_envelope(data, correlation_id)
    }

    /// Diagnostic snapshot.
    pub fn client_info(&self) -> ClientInfo {
        let reg = self.read();
        ClientInfo {
            connected: reg.is_connected(),
            subscribed_topics: reg.topics().len(),
            error_channel_buffer: self.error_rx.len(),
            dispatch_tasks: reg.running(),
        }
    }

    /// Enters the in-flight section; fails once `disconnect` has started.
    async fn admit(&self) -> Result<sync::RwLockReadGuard<'_, ()>, ClientError> {
        let guard = self.inflight.read().await;
        self.ensure_connected()?;
        Ok(guard)
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.dropped.cancel();
    }
}
