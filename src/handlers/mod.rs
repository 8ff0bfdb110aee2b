//! # Message handlers.
//!
//! - [`MessageHandler`] trait invoked by dispatch tasks
//! - [`HandlerFn`] closure-backed implementation
//! - [`HandlerRef`] shared handle (`Arc<dyn MessageHandler>`)

mod handler;
mod handler_fn;

pub use handler::MessageHandler;
pub use handler_fn::{HandlerFn, HandlerRef};
