//! The peer locator (C2): an append-only registry of peers a Location
//! Server is configured to speak TRIP with.

use std::net::{IpAddr, SocketAddr};

use parking_lot::RwLock;

use trip_ls_codec::message::TransMode;

/// One configured peer.
#[derive(Debug, Clone, Copy)]
pub struct PeerEntry {
    pub addr: SocketAddr,
    pub remote_itad: u32,
    pub hold: u16,
    pub trans_mode: TransMode,
}

fn normalized_ip(addr: SocketAddr) -> IpAddr {
    match addr.ip() {
        IpAddr::V4(v4) => IpAddr::V6(v4.to_ipv6_mapped()),
        v6 => v6,
    }
}

/// Authority for "known peer". The manager refuses any connection whose
/// source address is not present here.
#[derive(Default)]
pub struct Locator {
    entries: RwLock<Vec<PeerEntry>>,
}

impl Locator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `peer`. Addresses are compared by the 16-byte IPv6 address
    /// field only (port ignored); adding a duplicate is a no-op that logs a
    /// warning.
    pub fn add(&self, peer: PeerEntry) -> usize {
        let mut entries = self.entries.write();
        let ip = normalized_ip(peer.addr);
        if let Some(idx) = entries.iter().position(|e| normalized_ip(e.addr) == ip) {
            log::warn!("ignoring duplicate peer add: addr={:?}", peer.addr);
            return idx;
        }
        entries.push(peer);
        entries.len() - 1
    }

    /// Linear scan by address; the returned index is stable for the
    /// lifetime of the locator and doubles as the session slot key.
    pub fn lookup(&self, addr: SocketAddr) -> Option<(usize, PeerEntry)> {
        let ip = normalized_ip(addr);
        let entries = self.entries.read();
        entries
            .iter()
            .position(|e| normalized_ip(e.addr) == ip)
            .map(|idx| (idx, entries[idx]))
    }

    pub fn get(&self, index: usize) -> Option<PeerEntry> {
        self.entries.read().get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases storage, returning the locator to empty.
    pub fn destroy(&self) {
        self.entries.write().clear();
    }
}
