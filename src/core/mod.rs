//! Client core: connection lifecycle, subscription fan-out and shutdown.
//!
//! The public API from this module is [`Client`] (with [`ClientBuilder`] and
//! [`ClientInfo`]) plus the two halves of the shared error channel.
//!
//! Internal modules:
//! - [`client`]: connection guard, publish/subscribe/request operations;
//! - [`dispatch`]: one task per subscribed pattern, invoking the handler;
//! - [`registry`]: connection phase and active/retired subscriptions;
//! - [`shutdown`]: grace-bounded join of dispatch tasks;
//! - [`errors`]: bounded drop-on-full error channel.

mod builder;
mod client;
mod dispatch;
mod errors;
mod registry;
mod shutdown;

pub use builder::{ClientBuilder, EVENT_BUS_CAPACITY};
pub use client::{Client, ClientInfo};
pub use errors::{ErrorReceiver, ErrorSink};
#[cfg(test)]
pub(crate) use errors::error_channel;
