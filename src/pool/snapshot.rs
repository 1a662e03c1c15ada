//! Serializable view of a pool.

use serde::Serialize;

use crate::connection::{ConnectionId, ConnectionKind, ConnectionStatus};

#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub endpoint: String,
    pub kind: ConnectionKind,
    pub status: ConnectionStatus,
    pub size: usize,
    pub connected: usize,
    pub retry_count: u32,
    pub slots: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub index: usize,
    /// `None` while the slot is empty.
    pub connection_id: Option<ConnectionId>,
    pub status: Option<ConnectionStatus>,
    pub generation: Option<u64>,
}
