//! Dispose-or-restart policies.
//!
//! Every connection exit is followed by exactly one decision. A fixed pool
//! restarts at the same index to keep its cardinality; other variants may
//! retire the slot instead.

use crate::connection::ServiceConnection;

/// What to do with a slot whose connection exited.
///
/// The index must be the exited slot; the supervisor retires the slot when a
/// policy names any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Leave the slot empty.
    Retire(usize),
    /// Back off, then put a fresh connection in the slot.
    Restart(usize),
}

pub trait RestartPolicy: Send + Sync {
    fn decide(&self, slot: usize, connection: &dyn ServiceConnection) -> Disposition;
}

/// Always restart at the same index.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedRestart;

impl RestartPolicy for FixedRestart {
    fn decide(&self, slot: usize, _connection: &dyn ServiceConnection) -> Disposition {
        Disposition::Restart(slot)
    }
}

/// Never restart; the pool shrinks as connections exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetireOnExit;

impl RestartPolicy for RetireOnExit {
    fn decide(&self, slot: usize, _connection: &dyn ServiceConnection) -> Disposition {
        Disposition::Retire(slot)
    }
}

impl<F> RestartPolicy for F
where
    F: Fn(usize, &dyn ServiceConnection) -> Disposition + Send + Sync,
{
    fn decide(&self, slot: usize, connection: &dyn ServiceConnection) -> Disposition {
        self(slot, connection)
    }
}
