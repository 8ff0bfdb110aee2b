//! # Event observers.
//!
//! Observers receive the client's [`Event`](crate::events::Event)s through an
//! [`ObserverSet`]: one bounded queue and worker per observer.
//!
//! ```text
//! Client ── publish(Event) ──► Bus ──► observer listener ──► ObserverSet
//!                                                      ┌────────┼────────┐
//!                                                      ▼        ▼        ▼
//!                                                  LogWriter Metrics  Custom
//! ```
//!
//! ## Implementing an observer
//! ```no_run
//! use messagebus::{Event, EventKind, Observer};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Observer for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::HandlerFailed {
//!             // increment a counter
//!         }
//!     }
//! }
//! ```

mod log;
mod observer;
mod set;

pub use log::LogWriter;
pub use observer::Observer;
pub use set::ObserverSet;
pub(crate) use set::panic_message;
