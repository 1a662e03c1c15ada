//! Pool errors.

use thiserror::Error;

use crate::connection::ConnectionError;

/// Errors surfaced to pool callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// A keyed write was issued without a key.
    #[error("partition key must not be empty")]
    EmptyPartitionKey,

    /// No slot in the pool could take the write.
    #[error("no connection to endpoint {endpoint} is available ({size} slots tried)")]
    Unavailable { endpoint: String, size: usize },

    /// The write failed on the last slot of the sweep.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A pool needs at least one slot.
    #[error("invalid pool size {0}, expected at least 1")]
    InvalidSize(usize),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
