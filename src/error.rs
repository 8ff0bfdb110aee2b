//! Error types used by the client, the transport seam and message handlers.
//!
//! Three enums cover the three places a failure can come from:
//!
//! - [`ClientError`] is what every [`Client`](crate::Client) operation returns.
//! - [`TransportError`] is what a [`Transport`](crate::Transport) provider reports,
//!   either synchronously or through the shared error channel.
//! - [`HandlerError`] is what a [`MessageHandler`](crate::MessageHandler) returns;
//!   it is logged by the dispatch task and never propagated further.
//!
//! All of them provide `as_label` (stable snake_case, for logs/metrics) and
//! `as_message` helpers.

use std::time::Duration;
use thiserror::Error;

/// # Errors returned by client operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClientError {
    /// The operation requires a connected client.
    #[error("message bus is not connected")]
    NotConnected,

    /// The client was torn down and cannot be connected again.
    #[error("client is closed; create a new one to reconnect")]
    Closed,

    /// The topic pattern already has an active subscription.
    #[error("topic '{topic}' is already subscribed")]
    AlreadySubscribed {
        /// The duplicated pattern.
        topic: String,
    },

    /// A structured payload could not be encoded.
    #[error("failed to serialize payload: {error}")]
    Serialization {
        /// Encoder message.
        error: String,
    },

    /// The transport provider failed the operation.
    #[error("{op} failed: {source}")]
    Transport {
        /// Operation name (`connect`, `publish`, `subscribe`, ...).
        op: &'static str,
        /// The provider's error.
        #[source]
        source: TransportError,
    },

    /// A request did not receive its correlated response in time.
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A handler failed while processing a message on `topic`.
    #[error("handler failed on topic '{topic}': {source}")]
    Handler {
        /// Effective topic the message was delivered on.
        topic: String,
        /// The handler's error.
        #[source]
        source: HandlerError,
    },

    /// Configuration was rejected before any connection was attempted.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// Dispatch tasks did not stop within the shutdown grace period and were aborted.
    #[error("shutdown grace {grace:?} exceeded; stuck topics: {stuck:?}")]
    GraceExceeded {
        /// Configured grace duration.
        grace: Duration,
        /// Topics whose dispatch task had to be aborted.
        stuck: Vec<String>,
    },
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use messagebus::ClientError;
    ///
    /// assert_eq!(ClientError::NotConnected.as_label(), "not_connected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::NotConnected => "not_connected",
            ClientError::Closed => "client_closed",
            ClientError::AlreadySubscribed { .. } => "already_subscribed",
            ClientError::Serialization { .. } => "serialization_error",
            ClientError::Transport { .. } => "transport_error",
            ClientError::Timeout { .. } => "request_timeout",
            ClientError::Handler { .. } => "handler_error",
            ClientError::InvalidConfig { .. } => "invalid_config",
            ClientError::GraceExceeded { .. } => "grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ClientError::Transport { op, source } => format!("{op}: {}", source.as_message()),
            ClientError::Handler { topic, source } => {
                format!("topic={topic} {}", source.as_message())
            }
            other => other.to_string(),
        }
    }

    /// Wraps a provider error with the name of the failed operation.
    pub(crate) fn transport(op: &'static str, source: TransportError) -> Self {
        ClientError::Transport { op, source }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization {
            error: err.to_string(),
        }
    }
}

/// # Errors reported by a transport provider.
///
/// Cloneable so a provider can hand the same root cause both to the caller and
/// to the shared error channel.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The provider refused the operation.
    #[error("rejected: {reason}")]
    Rejected {
        /// Provider-supplied reason.
        reason: String,
    },

    /// A topic or pattern is malformed for this provider.
    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic {
        /// Offending topic.
        topic: String,
        /// Why it was refused.
        reason: String,
    },

    /// The provider gave up waiting (e.g. for a response).
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The elapsed limit.
        timeout: Duration,
    },

    /// Network or I/O failure inside the provider.
    #[error("i/o error: {error}")]
    Io {
        /// Underlying message.
        error: String,
    },

    /// The provider has no live connection.
    #[error("transport unavailable")]
    Unavailable,
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Rejected { .. } => "transport_rejected",
            TransportError::InvalidTopic { .. } => "transport_invalid_topic",
            TransportError::Timeout { .. } => "transport_timeout",
            TransportError::Io { .. } => "transport_io",
            TransportError::Unavailable => "transport_unavailable",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TransportError::Rejected { reason } => format!("rejected: {reason}"),
            TransportError::InvalidTopic { topic, reason } => {
                format!("invalid topic {topic}: {reason}")
            }
            TransportError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TransportError::Io { error } => format!("io: {error}"),
            TransportError::Unavailable => "unavailable".to_string(),
        }
    }
}

/// # Errors returned by message handlers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Processing failed.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The payload could not be decoded into the type the handler expects.
    #[error("payload decode failed: {error}")]
    Decode {
        /// Decoder message.
        error: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Decode { .. } => "handler_decode",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Decode { error } => format!("decode: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(ClientError::Closed.as_label(), "client_closed");
        assert_eq!(
            ClientError::transport("publish", TransportError::Unavailable).as_label(),
            "transport_error"
        );
        assert_eq!(
            TransportError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .as_label(),
            "transport_timeout"
        );
        assert_eq!(HandlerError::fail("x").as_label(), "handler_failed");
    }

    #[test]
    fn test_transport_error_keeps_operation_and_source() {
        let err = ClientError::transport(
            "subscribe",
            TransportError::InvalidTopic {
                topic: "a/#/b".into(),
                reason: "'#' must be last".into(),
            },
        );
        assert_eq!(err.to_string(), "subscribe failed: invalid topic 'a/#/b': '#' must be last");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.as_message(), "subscribe: invalid topic a/#/b: '#' must be last");
    }

    #[test]
    fn test_serde_json_error_maps_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ClientError = bad.into();
        assert!(matches!(err, ClientError::Serialization { .. }));
    }
}
