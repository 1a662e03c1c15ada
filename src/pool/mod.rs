//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! start():
//!     container.rs spawns one supervisor per slot
//!     → first initialized connection publishes the container into the endpoint
//!     → each supervisor runs its connection until it exits
//!     → policy.rs decides Retire or Restart
//!     → restart waits the backoff, swaps a fresh connection into slots.rs
//!
//! write(message) / write_partitioned(key, message):
//!     router.rs picks a start slot (random or key hash) and a direction
//!     → walks at most N slots, skipping ones that are not Connected
//!     → fails over on "not active", re-raises it on the last slot
//!     → Unavailable when no slot could take the write
//! ```
//!
//! # Design Decisions
//! - Fixed-size slot array, each slot an atomically swappable pointer
//! - No pool-wide lock on the write path; readers re-check status per attempt
//! - Dispose-or-restart is a strategy object, the supervisor is variant-agnostic
//! - One retry counter per container paces every slot's reconnects

pub mod container;
pub mod error;
pub mod policy;
pub mod router;
pub mod slots;
pub mod snapshot;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::connection::{ConnectionStatus, ServiceMessage};

pub use container::{ContainerBuilder, ServiceConnectionContainer};
pub use error::{PoolError, PoolResult};
pub use policy::{Disposition, FixedRestart, RestartPolicy, RetireOnExit};
pub use router::partition_slot;
pub use snapshot::{PoolSnapshot, SlotSnapshot};

/// Surface shared by every pool variant.
///
/// Higher layers hold containers through this trait and stay agnostic to
/// pool sizing and restart policy.
pub trait ConnectionContainer: Send + Sync {
    /// Run the pool. Completes only when every slot has been retired.
    fn start(self: Arc<Self>) -> BoxFuture<'static, ()>;

    /// Write to any available connection.
    fn write<'a>(&'a self, message: &'a ServiceMessage) -> BoxFuture<'a, PoolResult<()>>;

    /// Write to the connection the partition key maps to, failing over if needed.
    fn write_partitioned<'a>(
        &'a self,
        partition_key: &'a str,
        message: &'a ServiceMessage,
    ) -> BoxFuture<'a, PoolResult<()>>;

    /// `Connected` if any connection in the pool is connected.
    fn status(&self) -> ConnectionStatus;
}
