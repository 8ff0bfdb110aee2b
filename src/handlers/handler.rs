//! # Message handler abstraction.
//!
//! A [`MessageHandler`] receives every envelope delivered on the topic
//! patterns it was subscribed with. It is invoked by the pattern's dispatch
//! task, one message at a time, in the order the transport delivered them.
//!
//! Returning an error does not stop delivery: the error is logged and
//! published as [`EventKind::HandlerFailed`](crate::EventKind::HandlerFailed),
//! and the next message is handled normally.

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::message::MessageEnvelope;

/// # Asynchronous message handler.
///
/// `topic` is the concrete topic the message arrived on, or the subscribed
/// pattern when the transport did not report one; it is never empty.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use messagebus::{HandlerError, MessageEnvelope, MessageHandler};
///
/// struct Printer;
///
/// #[async_trait]
/// impl MessageHandler for Printer {
///     async fn handle(&self, topic: &str, envelope: MessageEnvelope) -> Result<(), HandlerError> {
///         println!("{topic}: {}", envelope.payload_str()?);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Processes one message.
    async fn handle(&self, topic: &str, envelope: MessageEnvelope) -> Result<(), HandlerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
