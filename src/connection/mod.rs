//! Connection contract consumed by the pool.
//!
//! # Responsibilities
//! - Define the lifecycle contract of a single relay connection
//! - Track connection status (Connecting → Connected → Disconnected)
//! - Generate unique connection IDs for tracing
//! - Define the factory used to create and re-create pool connections
//!
//! # Design Decisions
//! - The pool never touches sockets; it only drives `start`, `write` and `stop`
//! - Status is an atomic byte so the router can re-check it without locking
//! - Async methods return boxed futures so connections live behind `Arc<dyn _>`

pub mod error;
pub mod signal;
pub mod simulated;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::endpoint::ServiceEndpoint;

pub use error::ConnectionError;
pub use signal::InitSignal;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle status of a connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting = 0,
    Connected = 1,
    Disconnected = 2,
}

impl From<u8> for ConnectionStatus {
    fn from(val: u8) -> Self {
        match val {
            0 => ConnectionStatus::Connecting,
            1 => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        }
    }
}

/// Lock-free status cell for connection implementations.
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub fn load(&self) -> ConnectionStatus {
        ConnectionStatus::from(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, status: ConnectionStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

impl Default for AtomicStatus {
    fn default() -> Self {
        Self::new(ConnectionStatus::Connecting)
    }
}

/// Role of a server connection.
///
/// Roles may need different handshakes; the factory encodes that, the pool
/// only remembers which role to re-create on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    #[default]
    Default,
    OnDemand,
    Weak,
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionKind::Default => "default",
            ConnectionKind::OnDemand => "on_demand",
            ConnectionKind::Weak => "weak",
        };
        f.write_str(name)
    }
}

/// Outbound message routed through the pool.
///
/// The payload is opaque; only the optional partition key is used for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMessage {
    payload: Vec<u8>,
    partition_key: Option<String>,
}

impl ServiceMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            partition_key: None,
        }
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The partition key, if one is set and non-empty.
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// A single persistent link to the relay service.
pub trait ServiceConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn kind(&self) -> ConnectionKind;

    fn status(&self) -> ConnectionStatus;

    /// Resolved once the first handshake attempt finished, successful or not.
    fn init_signal(&self) -> &InitSignal;

    /// Run the connection. The returned future completes only when the
    /// connection's lifetime ends.
    fn start(self: Arc<Self>, target: Option<String>) -> BoxFuture<'static, Result<(), ConnectionError>>;

    /// Write one message. Fails with [`ConnectionError::NotActive`] when the
    /// connection cannot currently accept writes.
    fn write<'a>(&'a self, message: &'a ServiceMessage) -> BoxFuture<'a, Result<(), ConnectionError>>;

    /// Ask the connection to close. `start` completes once it has.
    fn stop(&self) {}
}

/// Creates connections for a pool.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, kind: ConnectionKind, owner: &ServiceEndpoint) -> Arc<dyn ServiceConnection>;
}

impl<F> ConnectionFactory for F
where
    F: Fn(ConnectionKind, &ServiceEndpoint) -> Arc<dyn ServiceConnection> + Send + Sync,
{
    fn create(&self, kind: ConnectionKind, owner: &ServiceEndpoint) -> Arc<dyn ServiceConnection> {
        self(kind, owner)
    }
}
