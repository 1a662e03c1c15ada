//! Write routing across the slot table.
//!
//! # Responsibilities
//! - Pick the first slot: uniformly random, or from the partition key hash
//! - Walk at most N slots in one direction, failing over on transient errors
//! - Report pool-unavailable after one full sweep
//!
//! # Design Decisions
//! - The sign of the initial value carries the walk direction, so an unkeyed
//!   write needs a single random draw in `[-N, N)`
//! - Slots that are empty or not `Connected` are skipped without a write
//! - Each slot is tried at most once per call

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::Rng;

use crate::connection::{ConnectionStatus, ServiceMessage};
use crate::observability::metrics;
use crate::pool::error::{PoolError, PoolResult};
use crate::pool::slots::SlotTable;

/// Visiting order of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sweep {
    start: usize,
    step: usize,
    count: usize,
}

impl Sweep {
    /// Non-negative `initial` walks forward, negative walks backward.
    /// `count` must be non-zero.
    pub(crate) fn new(initial: i64, count: usize) -> Self {
        let start = (initial.unsigned_abs() % count as u64) as usize;
        let step = if initial >= 0 { 1 } else { count - 1 };
        Self { start, step, count }
    }

    pub(crate) fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn positions(self) -> impl Iterator<Item = usize> {
        let mut index = self.start;
        (0..self.count).map(move |_| {
            let current = index;
            index = (index + self.step) % self.count;
            current
        })
    }
}

/// Initial value for an unkeyed write: uniform in `[-count, count)`.
pub(crate) fn random_initial(count: usize) -> i64 {
    let n = count as i64;
    rand::thread_rng().gen_range(-n..n)
}

/// Stable 32-bit hash of a partition key, sign included.
pub(crate) fn partition_hash(key: &str) -> i32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as i32
}

/// Slot a partition key starts its sweep at, in a pool of `count` slots.
pub fn partition_slot(key: &str, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    Sweep::new(partition_hash(key) as i64, count).start()
}

/// Write `message` to the first writable slot of the sweep starting at `initial`.
pub(crate) async fn write_with_retry(
    slots: &SlotTable,
    endpoint: &str,
    message: &ServiceMessage,
    initial: i64,
) -> PoolResult<()> {
    let count = slots.len();
    if count == 0 {
        return Err(PoolError::Unavailable {
            endpoint: endpoint.to_string(),
            size: 0,
        });
    }

    for (attempt, index) in Sweep::new(initial, count).positions().enumerate() {
        let Some(entry) = slots.load(index) else {
            continue;
        };
        let connection = &entry.connection;
        if connection.status() != ConnectionStatus::Connected {
            continue;
        }

        // Status can change between the check and the write.
        match connection.write(message).await {
            Ok(()) => {
                metrics::record_write(endpoint, "ok");
                return Ok(());
            }
            Err(e) if e.is_not_active() && attempt + 1 < count => {
                tracing::debug!(
                    endpoint = %endpoint,
                    slot = index,
                    connection_id = %connection.id(),
                    error = %e,
                    "Write failed, trying next slot"
                );
                metrics::record_failover(endpoint);
            }
            Err(e) => {
                metrics::record_write(endpoint, "error");
                return Err(e.into());
            }
        }
    }

    tracing::warn!(endpoint = %endpoint, slots = count, "No connection available for write");
    metrics::record_write(endpoint, "unavailable");
    Err(PoolError::Unavailable {
        endpoint: endpoint.to_string(),
        size: count,
    })
}
