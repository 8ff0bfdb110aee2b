//! # Message envelope: the unit of exchange with the transport.
//!
//! An envelope carries the payload bytes plus the metadata the bus needs:
//! correlation id, content type, and, on delivery, the concrete topic the
//! message arrived on.
//!
//! ## Received topic
//! A subscription may use a wildcard pattern (`edgex/events/#`). The provider
//! sets [`MessageEnvelope::received_topic`] to the concrete match
//! (`edgex/events/device/sensor01`). When it is absent or empty the dispatch
//! layer falls back to the subscribed pattern, see
//! [`MessageEnvelope::effective_topic`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, HandlerError};
use crate::message::payload::{Payload, new_correlation_id};

/// Content type tag applied to every envelope built by the codec.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Immutable message value exchanged with the transport provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Links a request to its response, or tags a message for tracing.
    pub correlation_id: String,
    /// Encoded payload.
    pub payload: Bytes,
    /// Payload content type.
    pub content_type: String,
    /// Concrete topic this envelope was delivered on (set by the provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_topic: Option<String>,
    /// Request identifier for request/response exchanges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl MessageEnvelope {
    /// Creates an envelope tagged as JSON content.
    pub fn new(correlation_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload: payload.into(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            received_topic: None,
            request_id: None,
        }
    }

    /// Overrides the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets the concrete topic the envelope was received on.
    #[must_use]
    pub fn with_received_topic(mut self, topic: impl Into<String>) -> Self {
        self.received_topic = Some(topic.into());
        self
    }

    /// Sets the request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Topic to report to a handler: the received topic if present and
    /// non-empty, otherwise `subscribed`.
    pub fn effective_topic<'a>(&'a self, subscribed: &'a str) -> &'a str {
        match self.received_topic.as_deref() {
            Some(topic) if !topic.is_empty() => topic,
            _ => subscribed,
        }
    }

    /// Payload as UTF-8 text.
    pub fn payload_str(&self) -> Result<&str, HandlerError> {
        std::str::from_utf8(&self.payload).map_err(|e| HandlerError::Decode {
            error: e.to_string(),
        })
    }

    /// Decodes a JSON payload into `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_slice(&self.payload).map_err(|e| HandlerError::Decode {
            error: e.to_string(),
        })
    }

    /// Builds a response to `request`, carrying its correlation and request ids.
    pub fn response_to(
        request: &MessageEnvelope,
        payload: impl Into<Payload>,
    ) -> Result<Self, ClientError> {
        let correlation_id = if request.correlation_id.is_empty() {
            new_correlation_id()
        } else {
            request.correlation_id.clone()
        };
        let mut response = Self::new(correlation_id, payload.into().into_bytes()?);
        response.request_id = request.request_id.clone();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_effective_topic_falls_back_to_pattern() {
        let env = MessageEnvelope::new("id", "x");
        assert_eq!(env.effective_topic("edgex/events/#"), "edgex/events/#");

        let empty = MessageEnvelope::new("id", "x").with_received_topic("");
        assert_eq!(empty.effective_topic("edgex/events/#"), "edgex/events/#");

        let actual = MessageEnvelope::new("id", "x").with_received_topic("edgex/events/device/sensor01");
        assert_eq!(
            actual.effective_topic("edgex/events/#"),
            "edgex/events/device/sensor01"
        );
    }

    #[test]
    fn test_decode_helpers() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Reading {
            value: f64,
        }

        let env = MessageEnvelope::new("id", r#"{"value":21.5}"#);
        assert_eq!(env.decode_json::<Reading>().unwrap(), Reading { value: 21.5 });
        assert_eq!(env.payload_str().unwrap(), r#"{"value":21.5}"#);

        let broken = MessageEnvelope::new("id", vec![0xff, 0xfe]);
        assert!(matches!(broken.payload_str(), Err(HandlerError::Decode { .. })));
        assert!(matches!(
            broken.decode_json::<Reading>(),
            Err(HandlerError::Decode { .. })
        ));
    }

    #[test]
    fn test_response_carries_request_ids() {
        let request = MessageEnvelope::new("corr-1", "ping").with_request_id("req-9");
        let response = MessageEnvelope::response_to(&request, "pong").unwrap();
        assert_eq!(response.correlation_id, "corr-1");
        assert_eq!(response.request_id.as_deref(), Some("req-9"));
        assert_eq!(&response.payload[..], b"pong");
    }

    #[test]
    fn test_serde_field_names() {
        let env = MessageEnvelope::new("c", "p").with_received_topic("a/b");
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("correlationId").is_some());
        assert!(json.get("receivedTopic").is_some());
        assert!(json.get("requestId").is_none());
    }
}
