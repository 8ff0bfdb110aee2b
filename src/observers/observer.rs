//! # Core observer trait
//!
//! `Observer` is the extension point for plugging custom event sinks (metrics,
//! audit, alerting) into a client. Each observer is driven by a dedicated
//! worker fed by a bounded queue owned by the
//! [`ObserverSet`](crate::observers::ObserverSet).
//!
//! ## Contract
//! - Implementations may be slow; they block neither the client nor other observers.
//! - Each observer declares its queue capacity via [`Observer::queue_capacity`].
//!   On overflow the event is dropped for that observer.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event observers.
///
/// Called from an observer-dedicated worker task.
#[async_trait]
pub trait Observer: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this observer's queue.
    fn queue_capacity(&self) -> usize {
        256
    }
}
