//! # messagebus
//!
//! **messagebus** is a high-level client for pub/sub message buses (MQTT, NATS)
//! used on edge and IoT platforms.
//!
//! The wire protocol lives behind a [`Transport`]. This crate adds the parts
//! around it: configuration translation, a connection guard, an envelope codec,
//! fan-out of subscriptions to async handlers, and teardown that never leaves a
//! dispatch task running after the connection is gone.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  subscribe(["a/b", "sensors/#"], handler)
//!            │
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Client                                                           │
//! │  - Registry (phase + pattern → subscription, RwLock)              │
//! │  - lifecycle mutex (connect/disconnect/subscribe/unsubscribe)     │
//! │  - shutdown token (parent of every subscription token)            │
//! │  - error channel (bounded, drop-on-full)                          │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        │ TopicChannel{pattern, sender} × N + ErrorSink     │
//!        ▼                                                   │
//! ┌──────────────────────┐                                   │
//! │ Transport (provider) │── envelopes ──┐                   │
//! └──────────────────────┘               ▼                   ▼
//!                          ┌──────────────┐   ┌──────────────┐
//!                          │ Dispatcher   │   │ Dispatcher   │   one per pattern
//!                          │ "a/b"        │   │ "sensors/#"  │
//!                          └──────┬───────┘   └──────┬───────┘
//!                                 ▼                  ▼
//!                         handler(topic, env)  handler(topic, env)
//!                                 │                  │
//!                                 ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast events)                     │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                        observer listener ──► ObserverSet
//!                                              ┌────┼────┐
//!                                              ▼    ▼    ▼
//!                                           LogWriter  custom
//! ```
//!
//! ### Shutdown
//! ```text
//! disconnect()
//!   ├─► phase = Closing            (publish/subscribe now see NotConnected)
//!   ├─► cancel shutdown token      (every Dispatcher exits after its current message)
//!   ├─► join tasks within grace    (stuck ones aborted → GraceExceeded)
//!   ├─► transport.disconnect()     (once)
//!   └─► phase = Closed
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Client**        | Connect, publish, subscribe, request/response.           | [`Client`], [`ClientBuilder`]               |
//! | **Handlers**      | Per-pattern async message processing.                    | [`MessageHandler`], [`HandlerFn`]           |
//! | **Envelopes**     | Payload encoding and correlation ids.                    | [`MessageEnvelope`], [`Payload`]            |
//! | **Transport**     | Pluggable provider seam.                                 | [`Transport`], [`TopicChannel`]             |
//! | **Observers**     | Hook into client events (logging, metrics).              | [`Observer`], [`LogWriter`]                 |
//! | **Policies**      | Connect retries with backoff and jitter.                 | [`RetryPolicy`], [`BackoffPolicy`]          |
//! | **Errors**        | Typed errors per layer.                                  | [`ClientError`], [`TransportError`]         |
//! | **Configuration** | Broker settings, env loading, provider translation.      | [`ClientConfig`], [`BusConfig`]             |
//!
//! ## Optional features
//! - `memory`: exports [`MemoryTransport`], an in-process broker for demos and tests.
//!
//! ## Example
//! ```rust
//! # #[cfg(feature = "memory")]
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     use std::sync::Arc;
//!     use messagebus::{
//!         Client, ClientConfig, HandlerError, HandlerFn, LogWriter, MemoryTransport,
//!         MessageEnvelope, Observer,
//!     };
//!
//!     let cfg = ClientConfig::default();
//!
//!     // Build observers (optional)
//!     let observers: Vec<Arc<dyn Observer>> = vec![Arc::new(LogWriter::default())];
//!
//!     let client = Client::builder(cfg)
//!         .with_observers(observers)
//!         .build(Arc::new(MemoryTransport::new()))?;
//!
//!     client.connect().await?;
//!     client
//!         .subscribe(
//!             ["edgex/events/#"],
//!             HandlerFn::arc(|topic: String, env: MessageEnvelope| async move {
//!                 println!("{topic}: {}", env.payload_str()?);
//!                 Ok::<_, HandlerError>(())
//!             }),
//!         )
//!         .await?;
//!
//!     client.publish("edgex/events/device/sensor01", "21.5").await?;
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! # #[cfg(not(feature = "memory"))]
//! # fn main() {}
//! ```
mod config;
mod core;
mod error;
mod events;
mod handlers;
mod message;
mod observers;
mod policies;
mod transport;
mod version;

// ---- Public re-exports ----

pub use config::{
    BusConfig, ClientConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_ERROR_CAPACITY, HostInfo, Protocol,
    TransportKind,
};
pub use crate::core::{Client, ClientBuilder, ClientInfo, EVENT_BUS_CAPACITY, ErrorReceiver, ErrorSink};
pub use error::{ClientError, HandlerError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{HandlerFn, HandlerRef, MessageHandler};
pub use message::{
    CONTENT_TYPE_JSON, CORRELATION_PREFIX, MessageEnvelope, Payload, create_envelope,
    new_correlation_id,
};
pub use observers::{LogWriter, Observer, ObserverSet};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
pub use transport::{TopicChannel, Transport, TransportRef};
pub use version::{VERSION, VersionInfo, version, version_string};

// Optional: in-process transport for demos and tests.
// Enable with: `--features memory`
#[cfg(feature = "memory")]
pub use transport::{MemoryTransport, topic_matches, validate_pattern};
