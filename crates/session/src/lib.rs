//! Session manager and peer locator for a TRIP Location Server.
//!
//! This crate owns everything above the wire codec: the peer registry
//! (`locator`), the per-peer finite state machine (`session`), and the
//! per-daemon object tying the two together with a TCP accept loop
//! (`manager`). It depends on [`trip_ls_codec`] for message shapes but does
//! no serialization of its own.

pub mod identity;
pub mod locator;
pub mod manager;
pub mod rib;
pub mod session;

pub use identity::{LocalIdentity, PeerIdentity};
pub use locator::Locator;
pub use manager::Manager;
pub use rib::{NullRibHandler, RibHandler};
pub use session::{Session, State};

/// Errors raised above the codec layer: transport failures and session
/// misuse. Codec errors (`trip_ls_codec::Error`) are folded in rather than
/// wrapped again, since a session converts most of them into an outbound
/// Notification before they ever reach a caller.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Codec(trip_ls_codec::Error),
    /// The peer that connected, or that a control-API call named, is not
    /// registered with the locator.
    UnknownPeer,
    /// An operation that requires the manager to be bound was attempted
    /// before `bind` or after `destroy`.
    NotBound,
    /// A configuration setter was called after the manager already started
    /// sessions.
    AlreadyConfigured,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Codec(e) => write!(f, "codec error: {e}"),
            Error::UnknownPeer => write!(f, "unknown peer"),
            Error::NotBound => write!(f, "manager not bound"),
            Error::AlreadyConfigured => write!(f, "already configured"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<trip_ls_codec::Error> for Error {
    fn from(e: trip_ls_codec::Error) -> Self {
        Error::Codec(e)
    }
}
