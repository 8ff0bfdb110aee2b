//! # Payload encoding and envelope construction.
//!
//! [`Payload`] is the input side of the codec. Three kinds are accepted:
//! - [`Payload::Binary`] passes through unchanged;
//! - [`Payload::Text`] becomes its UTF-8 bytes;
//! - [`Payload::Structured`] is JSON-encoded.
//!
//! Any `serde::Serialize` value becomes a structured payload through
//! [`Payload::structured`], which is where serialization failures surface.
//!
//! [`create_envelope`] turns a payload into a ready-to-publish
//! [`MessageEnvelope`]. It never performs I/O.

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ClientError;
use crate::message::envelope::{CONTENT_TYPE_JSON, MessageEnvelope};

/// Prefix of generated correlation identifiers.
pub const CORRELATION_PREFIX: &str = "MessageBus-";

/// Application data to publish.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Raw bytes, published as-is.
    Binary(Bytes),
    /// Text, published as its UTF-8 bytes.
    Text(String),
    /// Structured value, published as JSON.
    Structured(serde_json::Value),
}

impl Payload {
    /// Builds a structured payload from any serializable value.
    ///
    /// # Example
    /// ```
    /// use messagebus::Payload;
    /// use serde_json::json;
    ///
    /// let p = Payload::structured(&json!({ "temperature": 25.6 })).unwrap();
    /// assert!(matches!(p, Payload::Structured(_)));
    /// ```
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, ClientError> {
        Ok(Payload::Structured(serde_json::to_value(value)?))
    }

    /// Encodes the payload into the bytes carried by an envelope.
    pub fn into_bytes(self) -> Result<Bytes, ClientError> {
        match self {
            Payload::Binary(bytes) => Ok(bytes),
            Payload::Text(text) => Ok(Bytes::from(text)),
            Payload::Structured(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Structured(value)
    }
}

/// Generates a fresh, globally unique correlation identifier.
pub fn new_correlation_id() -> String {
    format!("{CORRELATION_PREFIX}{}", Uuid::new_v4())
}

/// Builds an envelope for `payload`.
///
/// Uses `correlation_id` when non-empty, otherwise generates one. The content
/// type is `application/json` for every payload kind.
pub fn create_envelope(
    payload: impl Into<Payload>,
    correlation_id: &str,
) -> Result<MessageEnvelope, ClientError> {
    let bytes = payload.into().into_bytes()?;
    let correlation_id = if correlation_id.is_empty() {
        new_correlation_id()
    } else {
        correlation_id.to_string()
    };
    Ok(MessageEnvelope::new(correlation_id, bytes).with_content_type(CONTENT_TYPE_JSON))
}
