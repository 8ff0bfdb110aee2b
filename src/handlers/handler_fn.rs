//! # Closure-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps `F: Fn(String, MessageEnvelope) -> Fut`, producing a
//! fresh future per message. Shared state goes in an `Arc` captured by the
//! closure.
//!
//! ## Example
//! ```rust
//! use messagebus::{HandlerError, HandlerFn, HandlerRef, MessageEnvelope};
//!
//! let h: HandlerRef = HandlerFn::arc(|topic: String, env: MessageEnvelope| async move {
//!     let _ = (topic, env);
//!     Ok::<_, HandlerError>(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::handlers::handler::MessageHandler;
use crate::message::MessageEnvelope;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn MessageHandler>;

/// Function-backed handler.
pub struct HandlerFn<F> {
    name: String,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Wraps `f` under a generic name.
    pub fn new(f: F) -> Self {
        Self::named("handler_fn", f)
    }

    /// Wraps `f` under `name` (used in logs).
    pub fn named(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> HandlerFn<F>
where
    F: Fn(String, MessageEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    /// Wraps `f` and returns it as a [`HandlerRef`].
    pub fn arc(f: F) -> HandlerRef {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(String, MessageEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, topic: &str, envelope: MessageEnvelope) -> Result<(), HandlerError> {
        (self.f)(topic.to_string(), envelope).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_closure_receives_topic_and_envelope() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let h: HandlerRef = HandlerFn::arc(move |topic: String, env: MessageEnvelope| {
            let counter = Arc::clone(&counter);
            async move {
                assert_eq!(topic, "test/topic");
                assert_eq!(&env.payload[..], b"test payload");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), HandlerError>(())
            }
        });

        let env = MessageEnvelope::new("test-id", "test payload");
        h.handle("test/topic", env).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(h.name(), "handler_fn");
    }

    #[tokio::test]
    async fn test_errors_are_returned_unchanged() {
        let h = HandlerFn::named("failing", |_t: String, _e: MessageEnvelope| async {
            Err::<(), _>(HandlerError::fail("nope"))
        });
        let err = h.handle("a", MessageEnvelope::new("i", "p")).await.unwrap_err();
        assert_eq!(err, HandlerError::fail("nope"));
        assert_eq!(h.name(), "failing");
    }
}
