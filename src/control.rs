//! The control API (C5): the command surface a CLI/config reader calls
//! into to bind, configure, and start the manager. This crate's `Config`
//! loader is the only caller, but the surface is kept separate from it the
//! way the teacher's `api::controller::Controller` sits between its config
//! and its `Service`/`Monitor` pair.

use std::net::SocketAddr;
use std::sync::Arc;

use codec::message::TransMode;
use session::{Manager, RibHandler};

#[derive(Debug)]
pub enum ControlError {
    AlreadyConfigured,
    NotBound,
    Session(session::Error),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::AlreadyConfigured => write!(f, "manager already configured"),
            ControlError::NotBound => write!(f, "manager not bound"),
            ControlError::Session(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<session::Error> for ControlError {
    fn from(e: session::Error) -> Self {
        match e {
            session::Error::AlreadyConfigured => ControlError::AlreadyConfigured,
            session::Error::NotBound => ControlError::NotBound,
            other => ControlError::Session(other),
        }
    }
}

/// Thin wrapper over `Arc<Manager<R>>` exposing exactly the operations
/// `spec.md` §4.5 names, in the order a config reader would call them:
/// bind, the three setters, one `add_peer` per configured peer, then run.
pub struct Control<R: RibHandler + 'static> {
    manager: Arc<Manager<R>>,
}

impl<R: RibHandler + 'static> Control<R> {
    pub fn new(manager: Arc<Manager<R>>) -> Self {
        Self { manager }
    }

    pub async fn bind(&self, listen_addr: SocketAddr) -> Result<(), ControlError> {
        self.manager.bind(listen_addr).await.map_err(Into::into)
    }

    pub fn set_itad(&self, itad: u32) -> Result<(), ControlError> {
        self.manager.set_itad(itad).map_err(Into::into)
    }

    pub fn set_id(&self, id: u32) -> Result<(), ControlError> {
        self.manager.set_id(id).map_err(Into::into)
    }

    pub fn set_hold(&self, hold: u16) -> Result<(), ControlError> {
        self.manager.set_hold(hold).map_err(Into::into)
    }

    pub fn add_peer(&self, addr: SocketAddr, remote_itad: u32, hold: u16, trans_mode: TransMode) -> usize {
        self.manager.add_peer(addr, remote_itad, hold, trans_mode)
    }

    pub fn run(&self) -> Result<(), ControlError> {
        self.manager.run().map_err(Into::into)
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await
    }
}
