//! Stand-in RIB used until a real route database is wired in. Route
//! selection itself is out of scope (`spec.md` §1); this crate only needs
//! somewhere to hand the callbacks so the manager has a concrete type to
//! spawn sessions against.

use codec::message::Update;
use session::{PeerIdentity, RibHandler};

#[derive(Default)]
pub struct LoggingRib;

impl RibHandler for LoggingRib {
    fn on_established(&self, peer: &PeerIdentity) {
        log::info!("session established: addr={}, itad={}, id={}", peer.addr, peer.itad, peer.id);
    }

    fn on_update(&self, peer: &PeerIdentity, update: &Update) {
        log::info!(
            "update received: addr={}, itad={}, attributes={}",
            peer.addr,
            peer.itad,
            update.attributes.len()
        );
    }

    fn on_closed(&self, peer: &PeerIdentity) {
        log::info!("session closed: addr={}, itad={}", peer.addr, peer.itad);
    }
}
