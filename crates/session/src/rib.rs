//! The callback surface a session uses to hand accepted events to whatever
//! owns route selection. Route database / best-path computation is out of
//! scope for this crate; `RibHandler` is the seam where that code plugs in.

use trip_ls_codec::message::Update;

use crate::identity::PeerIdentity;

/// Mirrors the shape of a TURN-style service handler: one method per event
/// of interest, each a default no-op so implementors only override what
/// they care about.
pub trait RibHandler: Send + Sync {
    fn on_established(&self, _peer: &PeerIdentity) {}

    fn on_update(&self, _peer: &PeerIdentity, _update: &Update) {}

    fn on_closed(&self, _peer: &PeerIdentity) {}
}

/// A `RibHandler` that does nothing, used where the binary has not wired a
/// real RIB yet.
#[derive(Default)]
pub struct NullRibHandler;

impl RibHandler for NullRibHandler {}
