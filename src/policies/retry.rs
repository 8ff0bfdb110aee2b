//! # Connect retry policy.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// How many times [`Client::connect_with_retry`](crate::Client::connect_with_retry)
/// tries, and how long it waits in between.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first (`0` = retry forever).
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::exponential(Duration::from_millis(500), Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` and `backoff`.
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, BackoffPolicy::default())
    }

    /// True if another attempt is allowed after `failed` failures.
    pub fn allows(&self, failed: u32) -> bool {
        self.max_attempts == 0 || failed < self.max_attempts
    }

    /// Delay before the attempt following `failed` failures (`failed >= 1`).
    pub fn delay(&self, failed: u32) -> Duration {
        self.backoff.next(failed.saturating_sub(1))
    }
}
