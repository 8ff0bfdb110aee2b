//! # Envelope codec.
//!
//! - [`MessageEnvelope`] the unit of exchange with the transport
//! - [`Payload`] application data in one of three kinds (binary, text, structured)
//! - [`create_envelope`] payload + optional correlation id → envelope (pure, no I/O)

mod envelope;
mod payload;

pub use envelope::{CONTENT_TYPE_JSON, MessageEnvelope};
pub use payload::{CORRELATION_PREFIX, Payload, create_envelope, new_correlation_id};
