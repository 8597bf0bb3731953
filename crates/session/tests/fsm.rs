use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::oneshot;

use trip_ls_codec::message::{TransMode, Update};
use trip_ls_session::identity::{LocalIdentity, PeerIdentity};
use trip_ls_session::rib::RibHandler;
use trip_ls_session::session::{Command, Session};

#[derive(Debug)]
enum Event {
    Established(PeerIdentity),
    Update(PeerIdentity, Update),
    Closed(PeerIdentity),
}

struct ChannelRib(UnboundedSender<Event>);

impl RibHandler for ChannelRib {
    fn on_established(&self, peer: &PeerIdentity) {
        let _ = self.0.send(Event::Established(*peer));
    }

    fn on_update(&self, peer: &PeerIdentity, update: &Update) {
        let _ = self.0.send(Event::Update(*peer, update.clone()));
    }

    fn on_closed(&self, peer: &PeerIdentity) {
        let _ = self.0.send(Event::Closed(*peer));
    }
}

async fn wait_for<F: Fn(&Event) -> bool>(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<Event>,
    pred: F,
) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ev = rx.recv().await.expect("channel closed before event arrived");
            if pred(&ev) {
                return ev;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

// P5: a clean handshake drives both sides to Established.
#[tokio::test]
async fn handshake_reaches_established_both_sides() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b_addr = listener.local_addr().unwrap();

    let (tx_a, mut rx_a) = unbounded_channel();
    let (tx_b, mut rx_b) = unbounded_channel();
    let rib_a = Arc::new(ChannelRib(tx_a));
    let rib_b = Arc::new(ChannelRib(tx_b));

    let a_local = LocalIdentity { itad: 1, id: 1, hold: 3 };
    let b_local = LocalIdentity { itad: 2, id: 2, hold: 3 };

    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (stream, addr) = listener.accept().await.unwrap();
        let peer = PeerIdentity { addr, itad: 1, id: 0 };
        let session = Session::new_inbound(b_local, peer, TransMode::SendRecv, stream, rib_b);
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = ready_tx.send(());
        session.run(rx).await;
    });
    ready_rx.await.unwrap();

    let peer_for_a = PeerIdentity { addr: b_addr, itad: 2, id: 0 };
    let session_a = Session::new_outbound(a_local, peer_for_a, TransMode::SendRecv, rib_a);
    let (tx_cmd, rx_cmd) = tokio::sync::mpsc::channel(1);
    tokio::spawn(session_a.run(rx_cmd));
    tx_cmd.send(Command::Start).await.unwrap();

    let a_established = wait_for(&mut rx_a, |e| matches!(e, Event::Established(_))).await;
    let b_established = wait_for(&mut rx_b, |e| matches!(e, Event::Established(_))).await;

    match (a_established, b_established) {
        (Event::Established(pa), Event::Established(pb)) => {
            assert_eq!(pa.id, 2);
            assert_eq!(pb.id, 1);
        }
        _ => unreachable!(),
    }
}

// P6: hold-timer expiry on the side whose peer goes silent returns it to
// Idle via a HoldExpired notification. The peer here is a hand-driven raw
// socket (not a Session) so it can complete the handshake and then say
// nothing further, instead of racing a real Session's own keepalive timer.
#[tokio::test]
async fn silence_past_hold_closes_session() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use trip_ls_codec::message::{Msg, Open};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b_addr = listener.local_addr().unwrap();

    let (tx_a, mut rx_a) = unbounded_channel();
    let rib_a = Arc::new(ChannelRib(tx_a));
    let a_local = LocalIdentity { itad: 1, id: 1, hold: 3 };

    tokio::spawn(async move {
        let (mut stream, _addr) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let mut filled = 0;

        loop {
            match Msg::decode(&buf[..filled]) {
                Ok((Msg::Open(_), consumed)) => {
                    buf.copy_within(consumed..filled, 0);
                    filled -= consumed;
                    break;
                }
                Ok(_) => panic!("expected Open"),
                Err(trip_ls_codec::Error::Incomplete) => {
                    filled += stream.read(&mut buf[filled..]).await.unwrap();
                }
                Err(e) => panic!("decode error: {e:?}"),
            }
        }

        let mut out = [0u8; 64];
        let open = Msg::Open(Open { version: 1, hold: 3, itad: 2, router_id: 2, capabilities: vec![] });
        let n = open.encode(&mut out).unwrap();
        stream.write_all(&out[..n]).await.unwrap();

        loop {
            match Msg::decode(&buf[..filled]) {
                Ok((Msg::Keepalive, consumed)) => {
                    buf.copy_within(consumed..filled, 0);
                    filled -= consumed;
                    break;
                }
                Ok(_) => panic!("expected Keepalive"),
                Err(trip_ls_codec::Error::Incomplete) => {
                    filled += stream.read(&mut buf[filled..]).await.unwrap();
                }
                Err(e) => panic!("decode error: {e:?}"),
            }
        }

        let n = Msg::Keepalive.encode(&mut out).unwrap();
        stream.write_all(&out[..n]).await.unwrap();

        // Go silent for longer than A's hold timer.
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let peer_for_a = PeerIdentity { addr: b_addr, itad: 2, id: 0 };
    let session_a = Session::new_outbound(a_local, peer_for_a, TransMode::SendRecv, rib_a);
    let (tx_cmd, rx_cmd) = tokio::sync::mpsc::channel(1);
    tokio::spawn(session_a.run(rx_cmd));
    tx_cmd.send(Command::Start).await.unwrap();

    wait_for(&mut rx_a, |e| matches!(e, Event::Established(_))).await;
    wait_for(&mut rx_a, |e| matches!(e, Event::Closed(_))).await;
}
