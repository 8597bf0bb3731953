//! The session manager (C4): the single per-daemon object holding the
//! listen socket, the peer locator, and the slot array of sessions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use trip_ls_codec::message::{TransMode, Update};

use crate::identity::{LocalIdentity, PeerIdentity};
use crate::locator::{Locator, PeerEntry};
use crate::rib::RibHandler;
use crate::session::{Command, Session};
use crate::Error;

const COMMAND_CHANNEL_DEPTH: usize = 8;

struct Slot {
    commands: mpsc::Sender<Command>,
    handle: JoinHandle<()>,
    is_outbound: bool,
    established: bool,
}

impl Slot {
    fn is_idle(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Wraps the caller's [`RibHandler`] so the manager can learn a peer's
/// established/closed status from the same callbacks a RIB would consume,
/// the way `turn-server`'s `Observer` wraps user hooks to also feed its own
/// monitor.
struct ManagerRib<R: RibHandler> {
    inner: Arc<R>,
    locator: Arc<Locator>,
    slots: Arc<Mutex<Vec<Option<Slot>>>>,
}

impl<R: RibHandler> RibHandler for ManagerRib<R> {
    fn on_established(&self, peer: &PeerIdentity) {
        self.inner.on_established(peer);
        if let Some((idx, _)) = self.locator.lookup(peer.addr) {
            if let Some(Some(slot)) = self.slots.lock().get_mut(idx) {
                slot.established = true;
            }
        }
    }

    fn on_update(&self, peer: &PeerIdentity, update: &Update) {
        self.inner.on_update(peer, update);
    }

    fn on_closed(&self, peer: &PeerIdentity) {
        self.inner.on_closed(peer);
        if let Some((idx, _)) = self.locator.lookup(peer.addr) {
            if let Some(Some(slot)) = self.slots.lock().get_mut(idx) {
                slot.established = false;
            }
        }
    }
}

/// Single per-daemon object: listen socket, locator, and the session slot
/// array parallel to it (same index domain, per invariant I1).
pub struct Manager<R: RibHandler + 'static> {
    listener: Mutex<Option<TcpListener>>,
    locator: Arc<Locator>,
    slots: Arc<Mutex<Vec<Option<Slot>>>>,
    /// Inbound sessions contending for a slot whose existing occupant is
    /// still live. Resolved as soon as either side learns the peer's
    /// router id (see `resolve_collision`), never decided at accept time.
    pending: Arc<Mutex<HashMap<usize, Slot>>>,
    local: Mutex<Option<LocalIdentity>>,
    started: AtomicBool,
    rib: Arc<ManagerRib<R>>,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<R: RibHandler + 'static> Manager<R> {
    pub fn new(rib: Arc<R>) -> Arc<Self> {
        let locator = Arc::new(Locator::new());
        let slots = Arc::new(Mutex::new(Vec::new()));
        let rib = Arc::new(ManagerRib { inner: rib, locator: locator.clone(), slots: slots.clone() });
        Arc::new(Self {
            listener: Mutex::new(None),
            locator,
            slots,
            pending: Arc::new(Mutex::new(HashMap::new())),
            local: Mutex::new(None),
            started: AtomicBool::new(false),
            rib,
            accept_handle: Mutex::new(None),
        })
    }

    /// Creates the manager's listen socket. May be called once per daemon
    /// lifetime.
    pub async fn bind(&self, listen_addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(listen_addr).await?;
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn ensure_unconfigured(&self) -> Result<(), Error> {
        if self.started.load(Ordering::Acquire) {
            Err(Error::AlreadyConfigured)
        } else {
            Ok(())
        }
    }

    pub fn set_itad(&self, itad: u32) -> Result<(), Error> {
        self.ensure_unconfigured()?;
        let mut local = self.local.lock();
        let mut id = local.unwrap_or(LocalIdentity { itad: 0, id: 0, hold: 0 });
        id.itad = itad;
        *local = Some(id);
        Ok(())
    }

    pub fn set_id(&self, id_value: u32) -> Result<(), Error> {
        self.ensure_unconfigured()?;
        let mut local = self.local.lock();
        let mut id = local.unwrap_or(LocalIdentity { itad: 0, id: 0, hold: 0 });
        id.id = id_value;
        *local = Some(id);
        Ok(())
    }

    pub fn set_hold(&self, hold: u16) -> Result<(), Error> {
        self.ensure_unconfigured()?;
        let mut local = self.local.lock();
        let mut id = local.unwrap_or(LocalIdentity { itad: 0, id: 0, hold: 0 });
        id.hold = hold;
        *local = Some(id);
        Ok(())
    }

    fn local_identity(&self) -> LocalIdentity {
        self.local.lock().unwrap_or(LocalIdentity { itad: 0, id: 0, hold: 90 })
    }

    /// Appends to the locator, grows the slot array in lockstep, and spawns
    /// an outbound session that dials as soon as it's scheduled. A repeat
    /// call for an address already in the locator is a no-op: `spec.md`'s
    /// Control API (§4.5) has no separate "start a peer" operation, so
    /// `add_peer` both registers and starts in one step.
    pub fn add_peer(self: &Arc<Self>, addr: SocketAddr, remote_itad: u32, hold: u16, trans_mode: TransMode) -> usize {
        let idx = self.locator.add(PeerEntry { addr, remote_itad, hold, trans_mode });

        let mut slots = self.slots.lock();
        while slots.len() <= idx {
            slots.push(None);
        }

        if let Some(Some(existing)) = slots.get(idx) {
            if !existing.is_idle() {
                // Locator reported a duplicate address and a session for it
                // is already running; spawning a second one would orphan
                // this one's handle/sender and violate I1.
                return idx;
            }
        }

        let peer = PeerIdentity { addr, itad: remote_itad, id: 0 };
        let session = Session::new_outbound(self.local_identity(), peer, trans_mode, self.rib.clone());
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_DEPTH);
        let handle = tokio::spawn(session.run(rx));
        let _ = tx.try_send(Command::Start);
        slots[idx] = Some(Slot { commands: tx, handle, is_outbound: true, established: false });
        self.started.store(true, Ordering::Release);
        idx
    }

    /// Sends `Command::Start` to the outbound session at `addr`, if any.
    pub async fn start_peer(&self, addr: SocketAddr) -> Result<(), Error> {
        let (idx, _) = self.locator.lookup(addr).ok_or(Error::UnknownPeer)?;
        let sender = self.slots.lock().get(idx).and_then(|s| s.as_ref()).map(|s| s.commands.clone());
        match sender {
            Some(tx) => {
                let _ = tx.send(Command::Start).await;
                Ok(())
            }
            None => Err(Error::UnknownPeer),
        }
    }

    /// Starts the accept loop on its own task.
    pub fn run(self: &Arc<Self>) -> Result<(), Error> {
        let listener = self.listener.lock().take().ok_or(Error::NotBound)?;
        let manager = self.clone();
        let handle = tokio::spawn(async move { manager.accept_loop(listener).await });
        *self.accept_handle.lock() = Some(handle);
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    continue;
                }
            };
            self.handle_inbound(stream, addr);
        }
    }

    fn handle_inbound(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let Some((idx, entry)) = self.locator.lookup(addr) else {
            log::warn!("rejecting connection from unknown peer {addr}");
            return;
        };

        let local = self.local_identity();
        let _ = stream.set_nodelay(true);
        let peer = PeerIdentity { addr, itad: entry.remote_itad, id: 0 };
        let session = Session::new_inbound(local, peer, entry.trans_mode, stream, self.rib.clone());
        let peer_id_rx = session.peer_id_rx();
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_DEPTH);
        let handle = tokio::spawn(session.run(rx));
        let slot = Slot { commands: tx, handle, is_outbound: false, established: false };

        let mut slots = self.slots.lock();
        let colliding = matches!(slots.get(idx), Some(Some(existing)) if !existing.is_idle());
        if !colliding {
            slots[idx] = Some(slot);
            return;
        }

        // An existing non-Idle session already occupies this peer's slot.
        // Neither side's router id is necessarily known yet, so the winner
        // can't be decided here: park the new session and let whichever of
        // the two sessions first parses a valid Open from this peer settle
        // it (spec.md P7's collision rule compares router ids, and the
        // losing side of a real collision never reaches `Established`, so
        // that callback can't be the trigger).
        self.pending.lock().insert(idx, slot);
        drop(slots);

        let manager = self.clone();
        tokio::spawn(async move { manager.await_collision(idx, peer_id_rx).await });
    }

    /// Waits for the contending inbound session at `idx` to learn its
    /// peer's router id, then resolves the collision in favor of whichever
    /// side has the numerically lower id (mirrors BGP's RFC 4271 rule).
    async fn await_collision(self: Arc<Self>, idx: usize, mut peer_id_rx: watch::Receiver<Option<u32>>) {
        loop {
            match peer_id_rx.changed().await {
                Err(_) => {
                    // The pending session ended without ever parsing a
                    // valid Open from this peer; nothing to resolve.
                    self.pending.lock().remove(&idx);
                    return;
                }
                Ok(()) => {
                    let Some(peer_id) = *peer_id_rx.borrow() else { continue };
                    self.resolve_collision(idx, peer_id);
                    return;
                }
            }
        }
    }

    fn resolve_collision(&self, idx: usize, peer_id: u32) {
        let local_id = self.local_identity().id;
        let mut slots = self.slots.lock();
        let mut pending = self.pending.lock();
        let Some(pending_slot) = pending.remove(&idx) else {
            // Already resolved by the other side's callback.
            return;
        };

        match slots.get(idx) {
            Some(Some(existing)) if !existing.is_idle() => {
                if local_id < peer_id {
                    let _ = existing.commands.try_send(Command::Shutdown);
                    slots[idx] = Some(pending_slot);
                } else {
                    let _ = pending_slot.commands.try_send(Command::Shutdown);
                }
            }
            // The existing session went idle on its own while we waited;
            // no real collision after all.
            _ => slots[idx] = Some(pending_slot),
        }
    }

    /// Shuts the listen socket down (the accept loop exits on its own),
    /// issues Cease to every non-Idle session, and waits for them to reach
    /// `Idle`.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.accept_handle.lock().take() {
            handle.abort();
        }

        let handles: Vec<(mpsc::Sender<Command>, JoinHandle<()>)> = {
            let mut slots = self.slots.lock();
            let mut pending = self.pending.lock();
            slots
                .iter_mut()
                .filter_map(|slot| slot.take())
                .chain(pending.drain().map(|(_, slot)| slot))
                .map(|slot| (slot.commands, slot.handle))
                .collect()
        };

        for (commands, handle) in handles {
            let _ = commands.send(Command::Shutdown).await;
            let _ = handle.await;
        }
    }

    /// Returns the manager to the uninitialized state so a reconfigure can
    /// proceed.
    pub async fn destroy(&self) {
        self.shutdown().await;
        self.locator.destroy();
        *self.local.lock() = None;
        self.started.store(false, Ordering::Release);
    }

    pub fn locator(&self) -> &Arc<Locator> {
        &self.locator
    }
}
