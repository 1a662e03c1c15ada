//! Connection-level errors.

use thiserror::Error;

use crate::connection::ConnectionId;

/// Errors reported by a single connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection cannot accept writes right now.
    #[error("connection {0} is not active")]
    NotActive(ConnectionId),

    /// The first handshake with the service failed.
    #[error("connection {id} handshake failed: {reason}")]
    Handshake { id: ConnectionId, reason: String },

    /// The connection was closed by the remote side or by a fault.
    #[error("connection {id} closed: {reason}")]
    Closed { id: ConnectionId, reason: String },
}

impl ConnectionError {
    /// True for the transient failure the router fails over on.
    pub fn is_not_active(&self) -> bool {
        matches!(self, ConnectionError::NotActive(_))
    }
}
