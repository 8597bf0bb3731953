//! The small, cheaply-cloned identity snapshots threaded through sessions.

use std::net::SocketAddr;

/// This daemon's own (itad, router id, hold) triple, set once via the
/// control API before the manager starts accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    pub itad: u32,
    pub id: u32,
    pub hold: u16,
}

/// A session's peer-identity tuple. Immutable after construction (I5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    pub addr: SocketAddr,
    pub itad: u32,
    pub id: u32,
}
