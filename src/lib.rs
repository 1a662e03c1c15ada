//! Connection-pool core of a relay client.
//!
//! Keeps a fixed-size pool of persistent connections to a message relay
//! service alive under failure, and routes outbound messages across it with
//! random load distribution, per-key affinity and failover.

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod observability;
pub mod pool;
pub mod resilience;

pub use config::RelayConfig;
pub use connection::{
    ConnectionError, ConnectionFactory, ConnectionId, ConnectionKind, ConnectionStatus,
    InitSignal, ServiceConnection, ServiceMessage,
};
pub use endpoint::ServiceEndpoint;
pub use pool::{
    ConnectionContainer, Disposition, FixedRestart, PoolError, PoolResult, RestartPolicy,
    RetireOnExit, ServiceConnectionContainer,
};
pub use resilience::BackoffPolicy;
