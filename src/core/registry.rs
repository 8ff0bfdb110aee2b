//! # Connection phase and subscription registry.
//!
//! Lives behind the client's `RwLock`; never held across `.await`.
//!
//! ```text
//! Disconnected ──connect──► Connected ──disconnect──► Closing ──► Closed
//! ```
//!
//! Unsubscribed patterns leave `active` immediately, but their task handles
//! are parked in `retired` until the task finishes, so `disconnect` can still
//! join a task that is busy in its handler.
//!
//! While `Closing`, the ids of the tasks being joined stay in `draining` so a
//! handler that calls `disconnect` from one of them is recognized.

use std::collections::BTreeMap;

use tokio::task::{Id, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Lifecycle phase of a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Disconnected,
    Connected,
    Closing,
    Closed,
}

/// One live subscription.
pub(crate) struct Subscription {
    pub(crate) token: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

pub(crate) struct Registry {
    pub(crate) phase: Phase,
    active: BTreeMap<String, Subscription>,
    retired: Vec<(String, JoinHandle<()>)>,
    draining: Vec<Id>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
            active: BTreeMap::new(),
            retired: Vec::new(),
            draining: Vec::new(),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    pub(crate) fn contains(&self, pattern: &str) -> bool {
        self.active.contains_key(pattern)
    }

    pub(crate) fn insert(&mut self, pattern: String, sub: Subscription) {
        self.active.insert(pattern, sub);
    }

    /// Active patterns, sorted.
    pub(crate) fn topics(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    /// Dispatch tasks still running, including retired ones.
    pub(crate) fn running(&self) -> usize {
        let active = self.active.values().filter(|s| !s.task.is_finished());
        let retired = self.retired.iter().filter(|(_, t)| !t.is_finished());
        active.count() + retired.count()
    }

    /// Cancels and removes `patterns`; returns those that were registered.
    pub(crate) fn retire(&mut self, patterns: &[String]) -> Vec<String> {
        self.retired.retain(|(_, t)| !t.is_finished());

        let mut removed = Vec::new();
        for pattern in patterns {
            if let Some(sub) = self.active.remove(pattern) {
                sub.token.cancel();
                self.retired.push((pattern.clone(), sub.task));
                removed.push(pattern.clone());
            }
        }
        removed
    }

    /// Takes every task handle, active and retired, and remembers their ids.
    pub(crate) fn drain(&mut self) -> Vec<(String, JoinHandle<()>)> {
        let mut tasks = std::mem::take(&mut self.retired);
        tasks.extend(
            std::mem::take(&mut self.active)
                .into_iter()
                .map(|(pattern, sub)| (pattern, sub.task)),
        );
        self.draining = tasks.iter().map(|(_, t)| t.id()).collect();
        tasks
    }

    /// True if `task` is one of the dispatch tasks handed out by [`drain`](Self::drain).
    pub(crate) fn is_draining(&self, task: Option<Id>) -> bool {
        task.is_some_and(|id| self.draining.contains(&id))
    }

    /// Marks the client closed.
    pub(crate) fn close(&mut self) {
        self.phase = Phase::Closed;
        self.draining.clear();
    }
}
