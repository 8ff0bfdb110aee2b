//! Client events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Client` (connect/subscribe/disconnect), dispatch tasks,
//!   `ErrorSink` (drops), `ObserverSet` workers (overflow/panic).
//! - **Consumers**: the observer listener spawned by `ClientBuilder::build`,
//!   and any receiver obtained from `Client::events`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
