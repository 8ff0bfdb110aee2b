//! Connect retry policies.
//!
//! ## Contents
//! - [`RetryPolicy`]   how many connect attempts, and the backoff between them
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so a fleet of clients does not reconnect in lockstep
//!
//! ## Wiring
//! ```text
//! Client::connect_with_retry(&RetryPolicy)
//!   loop {
//!     connect() ── Ok ──► done
//!        └─ Err ──► policy.allows(failed)? ── no ──► return last error
//!                      └─ yes ──► ConnectRetryScheduled ──► sleep(policy.delay(failed))
//!   }
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 5 attempts, first=500ms, factor=2.0, max=30s, jitter=Equal.
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
