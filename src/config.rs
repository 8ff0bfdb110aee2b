//! # Client configuration.
//!
//! Provides [`ClientConfig`], the settings consumed by [`Client::new`](crate::Client::new),
//! and its translation into the provider-facing [`BusConfig`].
//!
//! Config is used in two ways:
//! 1. **Client creation**: broker address, identity, credentials and QoS are
//!    translated with [`ClientConfig::to_bus_config`] for the transport provider.
//! 2. **Fan-out tuning**: delivery channel capacity, error channel capacity and
//!    the shutdown grace period shape the dispatch core.
//!
//! ## Sentinel values
//! - `qos = 0` → not forwarded to the provider (provider default applies)
//! - `grace = 0s` → disconnect waits for dispatch tasks without a limit
//! - `channel_capacity = 0` / `error_capacity = 0` → clamped to 1

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Default capacity of each per-topic delivery channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;
/// Default capacity of the shared error channel.
pub const DEFAULT_ERROR_CAPACITY: usize = 10;

/// Broker connection scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain TCP.
    #[default]
    Tcp,
    /// TLS over TCP.
    Ssl,
    /// WebSocket.
    Ws,
    /// WebSocket over TLS.
    Wss,
}

impl Protocol {
    /// Lowercase scheme name as used in broker URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Ssl => "ssl",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "ssl" | "tls" => Ok(Protocol::Ssl),
            "ws" => Ok(Protocol::Ws),
            "wss" => Ok(Protocol::Wss),
            other => Err(ClientError::InvalidConfig {
                reason: format!("unknown protocol '{other}' (expected tcp, ssl, ws or wss)"),
            }),
        }
    }
}

/// Transport family the provider speaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// MQTT 3.1.1 / 5.
    #[default]
    Mqtt,
    /// NATS core.
    Nats,
}

impl TransportKind {
    /// Lowercase family name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Mqtt => "mqtt",
            TransportKind::Nats => "nats",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" => Ok(TransportKind::Mqtt),
            "nats" => Ok(TransportKind::Nats),
            other => Err(ClientError::InvalidConfig {
                reason: format!("unknown transport type '{other}' (expected mqtt or nats)"),
            }),
        }
    }
}

/// Configuration for a [`Client`](crate::Client).
///
/// ## Field semantics
/// - `host`, `port`, `protocol`: broker address
/// - `kind`: transport family (`mqtt` | `nats`)
/// - `client_id`: unique connection identity
/// - `username`, `password`: optional credentials (forwarded only when non-empty)
/// - `qos`: 0/1/2, forwarded to the provider only when greater than zero
/// - `channel_capacity`: bound of every per-topic delivery channel
/// - `error_capacity`: bound of the shared error channel
/// - `grace`: how long `disconnect` waits for dispatch tasks (`0s` = no limit)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Connection scheme.
    pub protocol: Protocol,
    /// Transport family.
    #[serde(rename = "type")]
    pub kind: TransportKind,
    /// Connection identity; must be unique per broker.
    pub client_id: String,
    /// Optional user name.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Quality of service level (0, 1 or 2).
    pub qos: u8,
    /// Capacity of each per-topic delivery channel.
    ///
    /// A slow handler fills its channel; the provider then blocks (or drops,
    /// per its own policy). No buffering is added beyond this bound.
    pub channel_capacity: usize,
    /// Capacity of the shared error channel. Errors beyond it are dropped.
    pub error_capacity: usize,
    /// Maximum time `disconnect` waits for dispatch tasks before aborting them.
    pub grace: Duration,
}

impl Default for ClientConfig {
    /// Default configuration:
    ///
    /// - `localhost:1883` over `tcp`, `mqtt`
    /// - `client_id = "messagebus-client"`, no credentials, `qos = 0`
    /// - `channel_capacity = 100`, `error_capacity = 10`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            protocol: Protocol::Tcp,
            kind: TransportKind::Mqtt,
            client_id: "messagebus-client".to_string(),
            username: None,
            password: None,
            qos: 0,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            error_capacity: DEFAULT_ERROR_CAPACITY,
            grace: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `MESSAGEBUS_*` environment variables.
    ///
    /// Recognized: `MESSAGEBUS_HOST`, `MESSAGEBUS_PORT`, `MESSAGEBUS_PROTOCOL`,
    /// `MESSAGEBUS_TYPE`, `MESSAGEBUS_CLIENT_ID`, `MESSAGEBUS_USERNAME`,
    /// `MESSAGEBUS_PASSWORD`, `MESSAGEBUS_QOS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |name: &str| lookup(&format!("MESSAGEBUS_{name}")).filter(|v| !v.is_empty());

        if let Some(host) = get("HOST") {
            cfg.host = host;
        }
        if let Some(port) = get("PORT") {
            cfg.port = parse_number("MESSAGEBUS_PORT", &port)?;
        }
        if let Some(protocol) = get("PROTOCOL") {
            cfg.protocol = protocol.parse()?;
        }
        if let Some(kind) = get("TYPE") {
            cfg.kind = kind.parse()?;
        }
        if let Some(client_id) = get("CLIENT_ID") {
            cfg.client_id = client_id;
        }
        cfg.username = get("USERNAME");
        cfg.password = get("PASSWORD");
        if let Some(qos) = get("QOS") {
            cfg.qos = parse_number("MESSAGEBUS_QOS", &qos)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the fields a provider cannot work without.
    pub fn validate(&self) -> Result<(), ClientError> {
        let invalid = |reason: &str| {
            Err(ClientError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.host.trim().is_empty() {
            return invalid("host must not be empty");
        }
        if self.port == 0 {
            return invalid("port must be non-zero");
        }
        if self.client_id.trim().is_empty() {
            return invalid("client_id must not be empty");
        }
        if self.qos > 2 {
            return invalid("qos must be 0, 1 or 2");
        }
        Ok(())
    }

    /// Translates into the provider-facing configuration.
    ///
    /// `optional` always carries `ClientId`; `Username`/`Password` only when
    /// non-empty; `Qos` only when greater than zero.
    pub fn to_bus_config(&self) -> BusConfig {
        let mut optional = BTreeMap::new();
        optional.insert("ClientId".to_string(), self.client_id.clone());

        if let Some(user) = self.username.as_deref().filter(|u| !u.is_empty()) {
            optional.insert("Username".to_string(), user.to_string());
        }
        if let Some(pass) = self.password.as_deref().filter(|p| !p.is_empty()) {
            optional.insert("Password".to_string(), pass.to_string());
        }
        if self.qos > 0 {
            optional.insert("Qos".to_string(), self.qos.to_string());
        }

        BusConfig {
            broker: HostInfo {
                host: self.host.clone(),
                port: self.port,
                protocol: self.protocol,
            },
            kind: self.kind,
            optional,
        }
    }

    /// Delivery channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Error channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn error_capacity_clamped(&self) -> usize {
        self.error_capacity.max(1)
    }

    /// Shutdown grace as an `Option`.
    ///
    /// - `None` → wait until every dispatch task exits
    /// - `Some(d)` → abort tasks still running after `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T, ClientError> {
    raw.trim().parse().map_err(|_| ClientError::InvalidConfig {
        reason: format!("{name} is not a valid number: '{raw}'"),
    })
}

/// Broker address as seen by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host name or address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Scheme.
    pub protocol: Protocol,
}

impl HostInfo {
    /// `scheme://host:port`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Provider-facing configuration produced by [`ClientConfig::to_bus_config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker address.
    pub broker: HostInfo,
    /// Transport family.
    #[serde(rename = "type")]
    pub kind: TransportKind,
    /// Provider options (`ClientId`, `Username`, `Password`, `Qos`).
    pub optional: BTreeMap<String, String>,
}
