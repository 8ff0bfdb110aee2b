use std::sync::Arc;

use tokio::select;
use tokio::sync::{Mutex, broadcast::error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::client::Client;
use super::errors::error_channel;
use super::registry::Registry;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::Bus;
use crate::observers::{Observer, ObserverSet};
use crate::transport::TransportRef;

/// Capacity of the broadcast channel behind [`Client::events`].
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Builder for a [`Client`] with optional observers.
pub struct ClientBuilder {
    cfg: ClientConfig,
    observers: Vec<Arc<dyn Observer>>,
}

impl ClientBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: ClientConfig) -> Self {
        Self {
            cfg,
            observers: Vec::new(),
        }
    }

    /// Sets event observers.
    ///
    /// Each observer gets a dedicated worker with a bounded queue. Building with
    /// observers must happen inside a Tokio runtime.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observer>>) -> Self {
        self.observers = observers;
        self
    }

    /// Validates the configuration and builds the client (disconnected).
    pub fn build(self, transport: TransportRef) -> Result<Client, ClientError> {
        self.cfg.validate()?;

        let bus = Bus::new(EVENT_BUS_CAPACITY);
        let (errors, error_rx) = error_channel(self.cfg.error_capacity_clamped(), bus.clone());

        let dropped = CancellationToken::new();
        if !self.observers.is_empty() {
            let set = ObserverSet::new(self.observers, bus.clone());
            observer_listener(set, &bus, dropped.clone());
        }

        Ok(Client {
            cfg: self.cfg,
            transport,
            bus,
            registry: std::sync::RwLock::new(Registry::new()),
            lifecycle: Mutex::new(()),
            inflight: tokio::sync::RwLock::new(()),
            errors,
            error_rx,
            shutdown: CancellationToken::new(),
            closed: CancellationToken::new(),
            dropped,
        })
    }
}

/// Forwards bus events to the observer set until the client is dropped.
///
/// Events already on the bus when `stop` fires are still delivered.
fn observer_listener(set: ObserverSet, bus: &Bus, stop: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            select! {
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "observer listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    });
}
