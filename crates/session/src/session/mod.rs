//! The per-peer session finite state machine (C3).
//!
//! A session is driven by three input streams: messages parsed off the
//! socket, timer expirations (hold, keepalive, connect-retry), and
//! administrative commands from the manager/control API. `Session::run`
//! owns all of that and runs until the session reaches `Idle` after a
//! shutdown command, at which point the task exits.

mod timers;

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use trip_ls_codec::message::{notification, Msg, Notification, Open, TransMode};

use crate::identity::{LocalIdentity, PeerIdentity};
use crate::rib::RibHandler;
use crate::Error;

pub use timers::{ConnectRetry, NegotiatedTimers};

/// The minimum receive/send buffer capacity mandated by the wire format;
/// grown up to `MAX_MESSAGE_LEN` on demand.
const MIN_BUF_CAP: usize = 4096;
/// `3` (header) + `u16::MAX` (largest representable payload length).
const MAX_MESSAGE_LEN: usize = 3 + u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Inbound,
    Outbound,
}

/// Administrative commands a session's owner (the manager/control API)
/// sends down the session's command channel.
#[derive(Debug)]
pub enum Command {
    Start,
    Shutdown,
}

struct Framer {
    buf: Vec<u8>,
    filled: usize,
}

impl Framer {
    fn new() -> Self {
        Self { buf: vec![0u8; MIN_BUF_CAP], filled: 0 }
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if self.buf.len() < needed {
            self.buf.resize(needed.min(MAX_MESSAGE_LEN), 0);
        }
    }

    fn consume(&mut self, n: usize) {
        self.buf.copy_within(n..self.filled, 0);
        self.filled -= n;
    }
}

/// One TRIP session: a TCP connection to exactly one configured peer,
/// driven through the states in [`State`].
pub struct Session<R: RibHandler> {
    local: LocalIdentity,
    peer: PeerIdentity,
    trans_mode: TransMode,
    direction: Direction,
    state: State,
    socket: Option<TcpStream>,
    recv: Framer,
    retry: ConnectRetry,
    negotiated: Option<NegotiatedTimers>,
    /// Set once on entering `Established`, then refreshed only when a
    /// message actually arrives from the peer — never by our own outgoing
    /// keepalive, or a silent peer would never trip the hold timer.
    hold_deadline: Option<Instant>,
    rib: Arc<R>,
    /// Publishes the peer's router id the moment it's parsed out of an
    /// Open, well before `Established`. The manager subscribes to this to
    /// resolve collisions without waiting on a callback the losing side of
    /// a real collision never reaches.
    peer_id_tx: watch::Sender<Option<u32>>,
}

impl<R: RibHandler> Session<R> {
    /// Builds a session that will dial `peer` once it receives
    /// `Command::Start`.
    pub fn new_outbound(local: LocalIdentity, peer: PeerIdentity, trans_mode: TransMode, rib: Arc<R>) -> Self {
        let (peer_id_tx, _) = watch::channel(None);
        Self {
            local,
            peer,
            trans_mode,
            direction: Direction::Outbound,
            state: State::Idle,
            socket: None,
            recv: Framer::new(),
            retry: ConnectRetry::default(),
            negotiated: None,
            hold_deadline: None,
            rib,
            peer_id_tx,
        }
    }

    /// Builds a session around an already-accepted inbound connection. Per
    /// the transition table, adopting the fd immediately sends our Open and
    /// moves to `OpenSent`.
    pub fn new_inbound(
        local: LocalIdentity,
        peer: PeerIdentity,
        trans_mode: TransMode,
        socket: TcpStream,
        rib: Arc<R>,
    ) -> Self {
        let (peer_id_tx, _) = watch::channel(None);
        Self {
            local,
            peer,
            trans_mode,
            direction: Direction::Inbound,
            state: State::Idle,
            socket: Some(socket),
            recv: Framer::new(),
            retry: ConnectRetry::default(),
            negotiated: None,
            hold_deadline: None,
            rib,
            peer_id_tx,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Resolves once this session has learned its peer's router id from a
    /// validated Open. Subscribe before the session is consumed by `run`.
    pub fn peer_id_rx(&self) -> watch::Receiver<Option<u32>> {
        self.peer_id_tx.subscribe()
    }

    fn local_open(&self) -> Open {
        Open {
            version: 1,
            hold: self.local.hold,
            itad: self.local.itad,
            router_id: self.local.id,
            capabilities: Vec::new(),
        }
    }

    async fn send_msg(&mut self, msg: &Msg) -> Result<(), Error> {
        let socket = self.socket.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(ErrorKind::NotConnected, "session has no socket"))
        })?;

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let n = msg.encode(&mut buf)?;
        let mut written = 0;
        while written < n {
            let w = socket.write(&buf[written..n]).await?;
            if w == 0 {
                return Err(Error::Io(std::io::Error::new(ErrorKind::WriteZero, "write returned 0")));
            }
            written += w;
        }
        Ok(())
    }

    async fn recv_msg(&mut self) -> Result<Msg, Error> {
        loop {
            match Msg::decode(&self.recv.buf[..self.recv.filled]) {
                Ok((msg, consumed)) => {
                    self.recv.consume(consumed);
                    return Ok(msg);
                }
                Err(trip_ls_codec::Error::Incomplete) => {
                    if let Ok(needed) = Msg::peek_len(&self.recv.buf[..self.recv.filled]) {
                        self.recv.ensure_capacity(needed);
                    } else if self.recv.filled == self.recv.buf.len() {
                        let doubled = self.recv.buf.len() * 2;
                        self.recv.ensure_capacity(doubled);
                    }

                    let socket = self.socket.as_mut().ok_or_else(|| {
                        Error::Io(std::io::Error::new(ErrorKind::NotConnected, "session has no socket"))
                    })?;
                    let n = socket.read(&mut self.recv.buf[self.recv.filled..]).await?;
                    if n == 0 {
                        return Err(Error::Io(std::io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "peer closed connection",
                        )));
                    }
                    self.recv.filled += n;
                }
                Err(e) => return Err(Error::Codec(e)),
            }
        }
    }

    fn close(&mut self) {
        self.socket = None;
        self.negotiated = None;
        self.hold_deadline = None;
        self.recv.filled = 0;
        self.state = State::Idle;
    }

    /// Resets the hold deadline from now, or clears it if the negotiated
    /// hold is disabled. Called on entering `Established` and again on
    /// every message actually received from the peer thereafter.
    fn refresh_hold_deadline(&mut self, timers: &NegotiatedTimers) {
        self.hold_deadline = (!timers.disabled()).then(|| Instant::now() + timers.hold);
    }

    async fn close_with_notification(&mut self, notif: Notification) {
        let msg = Msg::Notification(notif);
        let _ = self.send_msg(&msg).await;
        self.rib.on_closed(&self.peer);
        self.close();
    }

    /// Maps a codec decode failure to the (code, subcode) pair the matrix
    /// in `spec.md` §6 assigns it, per the session's duty (§7 layer 1
    /// propagation policy) to surface codec errors as outbound
    /// Notifications when feasible.
    fn notification_for_codec_error(e: &trip_ls_codec::Error) -> (notification::Code, u8) {
        use trip_ls_codec::Error::*;
        match e {
            MsgType => (notification::Code::MsgError, 2),
            Buf | BufTooSmall | Incomplete => (notification::Code::MsgError, 1),
            Version => (notification::Code::OpenError, 1),
            Itad => (notification::Code::OpenError, 2),
            Hold => (notification::Code::OpenError, 5),
            Opt | CapinfoCode | Af | AppProto | Trans => (notification::Code::OpenError, 6),
            AttrType => (notification::Code::UpdateError, 1),
            MissingWellKnown => (notification::Code::UpdateError, 3),
            MissingLsEncap | ItadPathType | CommunityItad => (notification::Code::UpdateError, 6),
            NotifCode | NotifSubcode => (notification::Code::MsgError, 2),
        }
    }

    /// Validates a peer Open against this session's configured expectations
    /// (protocol version and the remote ITAD the locator was configured
    /// with). The peer's router id is not known in advance — the locator
    /// only records `(addr, remote_itad, hold, trans_mode)` — so it is
    /// learned here rather than checked.
    fn validate_peer_open(&self, open: &Open) -> Result<(), (notification::Code, u8)> {
        if open.version != 1 {
            return Err((notification::Code::OpenError, 1));
        }
        if open.itad == 0 || open.itad != self.peer.itad {
            return Err((notification::Code::OpenError, 2));
        }
        Ok(())
    }

    /// Runs the FSM until a shutdown command drives it to `Idle` and the
    /// command channel is closed.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        if self.direction == Direction::Inbound {
            if let Err(e) = self.send_msg(&Msg::Open(self.local_open())).await {
                log::warn!("session {}: failed to send Open: {e}", self.peer.addr);
                self.close();
            } else {
                self.state = State::OpenSent;
            }
        }

        loop {
            match self.state {
                State::Idle => {
                    if self.direction == Direction::Outbound {
                        match commands.recv().await {
                            Some(Command::Start) => self.state = State::Connect,
                            Some(Command::Shutdown) | None => return,
                        }
                    } else {
                        // Inbound session that failed before OpenSent: nothing
                        // more to do until the manager drops this task.
                        return;
                    }
                }

                State::Connect => {
                    tokio::select! {
                        cmd = commands.recv() => {
                            if matches!(cmd, Some(Command::Shutdown) | None) {
                                return;
                            }
                        }
                        result = TcpStream::connect(self.peer.addr) => {
                            match result {
                                Ok(stream) => {
                                    let _ = stream.set_nodelay(true);
                                    self.socket = Some(stream);
                                    self.retry.reset();
                                    if self.send_msg(&Msg::Open(self.local_open())).await.is_ok() {
                                        self.state = State::OpenSent;
                                    } else {
                                        self.close();
                                        self.state = State::Active;
                                    }
                                }
                                Err(e) => {
                                    log::warn!("session {}: connect failed: {e}", self.peer.addr);
                                    self.retry.backoff();
                                    self.state = State::Active;
                                }
                            }
                        }
                    }
                }

                State::Active => {
                    tokio::select! {
                        cmd = commands.recv() => {
                            if matches!(cmd, Some(Command::Shutdown) | None) {
                                return;
                            }
                        }
                        _ = tokio::time::sleep(self.retry.delay()) => {
                            self.state = State::Connect;
                        }
                    }
                }

                State::OpenSent => {
                    tokio::select! {
                        cmd = commands.recv() => {
                            match cmd {
                                Some(Command::Shutdown) | None => {
                                    self.close_with_notification(Notification {
                                        code: notification::Code::Cease,
                                        subcode: 0,
                                        data: Vec::new(),
                                    }).await;
                                    return;
                                }
                                Some(Command::Start) => {}
                            }
                        }
                        msg = self.recv_msg() => {
                            match msg {
                                Ok(Msg::Open(open)) => match self.validate_peer_open(&open) {
                                    Ok(()) => {
                                        self.peer.id = open.router_id;
                                        let _ = self.peer_id_tx.send(Some(open.router_id));
                                        self.negotiated = Some(NegotiatedTimers::negotiate(
                                            self.local.hold,
                                            open.hold,
                                        ));
                                        if self.send_msg(&Msg::Keepalive).await.is_ok() {
                                            self.state = State::OpenConfirm;
                                        } else {
                                            self.close();
                                        }
                                    }
                                    Err((code, subcode)) => {
                                        self.close_with_notification(Notification {
                                            code,
                                            subcode,
                                            data: Vec::new(),
                                        }).await;
                                    }
                                },
                                Ok(_) => {
                                    self.close_with_notification(Notification {
                                        code: notification::Code::FsmError,
                                        subcode: 0,
                                        data: Vec::new(),
                                    }).await;
                                }
                                Err(Error::Codec(e)) => {
                                    let (code, subcode) = Self::notification_for_codec_error(&e);
                                    self.close_with_notification(Notification {
                                        code,
                                        subcode,
                                        data: Vec::new(),
                                    }).await;
                                }
                                Err(e) => {
                                    log::warn!("session {}: transport error in OpenSent: {e}", self.peer.addr);
                                    self.close();
                                }
                            }
                        }
                    }
                }

                State::OpenConfirm => {
                    tokio::select! {
                        cmd = commands.recv() => {
                            match cmd {
                                Some(Command::Shutdown) | None => {
                                    self.close_with_notification(Notification {
                                        code: notification::Code::Cease,
                                        subcode: 0,
                                        data: Vec::new(),
                                    }).await;
                                    return;
                                }
                                Some(Command::Start) => {}
                            }
                        }
                        msg = self.recv_msg() => {
                            match msg {
                                Ok(Msg::Keepalive) => {
                                    let timers = self.negotiated.expect("OpenConfirm implies negotiated timers");
                                    self.refresh_hold_deadline(&timers);
                                    self.rib.on_established(&self.peer);
                                    self.state = State::Established;
                                }
                                Ok(Msg::Notification(_)) => self.close(),
                                Ok(_) => {
                                    self.close_with_notification(Notification {
                                        code: notification::Code::FsmError,
                                        subcode: 0,
                                        data: Vec::new(),
                                    }).await;
                                }
                                Err(Error::Codec(e)) => {
                                    let (code, subcode) = Self::notification_for_codec_error(&e);
                                    self.close_with_notification(Notification {
                                        code,
                                        subcode,
                                        data: Vec::new(),
                                    }).await;
                                }
                                Err(e) => {
                                    log::warn!("session {}: transport error in OpenConfirm: {e}", self.peer.addr);
                                    self.close();
                                }
                            }
                        }
                    }
                }

                State::Established => {
                    let timers = self.negotiated.expect("Established implies negotiated timers");
                    let hold_deadline = self.hold_deadline;

                    tokio::select! {
                        cmd = commands.recv() => {
                            match cmd {
                                Some(Command::Shutdown) | None => {
                                    self.close_with_notification(Notification {
                                        code: notification::Code::Cease,
                                        subcode: 0,
                                        data: Vec::new(),
                                    }).await;
                                    return;
                                }
                                Some(Command::Start) => {}
                            }
                        }
                        _ = async {
                            match timers.disabled() {
                                false => tokio::time::sleep(timers.keepalive).await,
                                true => std::future::pending::<()>().await,
                            }
                        } => {
                            if self.send_msg(&Msg::Keepalive).await.is_err() {
                                self.rib.on_closed(&self.peer);
                                self.close();
                            }
                        }
                        _ = async {
                            match hold_deadline {
                                Some(deadline) => tokio::time::sleep_until(deadline).await,
                                None => std::future::pending::<()>().await,
                            }
                        } => {
                            self.close_with_notification(Notification {
                                code: notification::Code::HoldExpired,
                                subcode: 0,
                                data: Vec::new(),
                            }).await;
                        }
                        msg = self.recv_msg() => {
                            match msg {
                                Ok(Msg::Update(update)) => {
                                    self.refresh_hold_deadline(&timers);
                                    self.rib.on_update(&self.peer, &update);
                                }
                                Ok(Msg::Keepalive) => {
                                    self.refresh_hold_deadline(&timers);
                                }
                                Ok(Msg::Notification(n)) if n.code == notification::Code::Cease => {
                                    self.rib.on_closed(&self.peer);
                                    self.close();
                                }
                                Ok(Msg::Notification(_)) => {
                                    self.rib.on_closed(&self.peer);
                                    self.close();
                                }
                                Ok(Msg::Open(_)) => {
                                    self.close_with_notification(Notification {
                                        code: notification::Code::FsmError,
                                        subcode: 0,
                                        data: Vec::new(),
                                    }).await;
                                }
                                Err(Error::Codec(e)) => {
                                    let (code, subcode) = Self::notification_for_codec_error(&e);
                                    self.close_with_notification(Notification {
                                        code,
                                        subcode,
                                        data: Vec::new(),
                                    }).await;
                                }
                                Err(e) => {
                                    log::warn!("session {}: transport error in Established: {e}", self.peer.addr);
                                    self.rib.on_closed(&self.peer);
                                    self.close();
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
