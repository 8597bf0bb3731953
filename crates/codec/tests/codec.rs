use trip_ls_codec::message::{
    Attribute, AttrFlags, AttributeKind, Capability, Community, ItadPathSegment, ItadPathType,
    Msg, NextHop, Notification, Open, Route, RouteTypeEntry, TopologyLink, TransMode, Update,
};
use trip_ls_codec::Error;

fn well_known(kind: AttributeKind) -> Attribute {
    Attribute { flags: AttrFlags { well_known: true, ..Default::default() }, ls_encap: None, kind }
}

// P1: round-trip for every message type.

#[test]
fn round_trips_open() -> anyhow::Result<()> {
    let msg = Msg::Open(Open {
        version: 1,
        hold: 90,
        itad: 100,
        router_id: 0x0A00_0001,
        capabilities: vec![
            Capability::RouteType(vec![RouteTypeEntry { address_family: 1, app_protocol: 1 }]),
            Capability::TransMode(TransMode::SendRecv),
        ],
    });

    let mut buf = [0u8; 256];
    let n = msg.encode(&mut buf)?;
    let (decoded, consumed) = Msg::decode(&buf[..n])?;
    assert_eq!(consumed, n);
    assert_eq!(decoded, msg);
    Ok(())
}

#[test]
fn round_trips_open_with_no_capabilities() -> anyhow::Result<()> {
    let msg = Msg::Open(Open { version: 1, hold: 0, itad: 7, router_id: 1, capabilities: vec![] });
    let mut buf = [0u8; 64];
    let n = msg.encode(&mut buf)?;
    let (decoded, _) = Msg::decode(&buf[..n])?;
    assert_eq!(decoded, msg);
    Ok(())
}

#[test]
fn round_trips_keepalive() -> anyhow::Result<()> {
    let msg = Msg::Keepalive;
    let mut buf = [0u8; 8];
    let n = msg.encode(&mut buf)?;
    assert_eq!(n, 3);
    let (decoded, consumed) = Msg::decode(&buf[..n])?;
    assert_eq!(consumed, 3);
    assert_eq!(decoded, Msg::Keepalive);
    Ok(())
}

#[test]
fn round_trips_notification() -> anyhow::Result<()> {
    let msg = Msg::Notification(Notification {
        code: trip_ls_codec::message::notification::Code::OpenError,
        subcode: 3,
        data: vec![1, 2, 3, 4],
    });
    let mut buf = [0u8; 64];
    let n = msg.encode(&mut buf)?;
    let (decoded, _) = Msg::decode(&buf[..n])?;
    assert_eq!(decoded, msg);
    Ok(())
}

#[test]
fn round_trips_update_with_every_attribute_kind() -> anyhow::Result<()> {
    let route = Route { address_family: 1, app_protocol: 1, route_len_bits: 12, value: vec![0x12, 0x30] };
    let update = Update {
        attributes: vec![
            well_known(AttributeKind::WithdrawnRoutes(vec![route.clone()])),
            well_known(AttributeKind::ReachableRoutes(vec![route.clone()])),
            well_known(AttributeKind::NextHopServer(NextHop {
                address_family: 1,
                address: vec![192, 0, 2, 1],
            })),
            Attribute {
                flags: AttrFlags::default(),
                ls_encap: None,
                kind: AttributeKind::AdvertisementPath(vec![ItadPathSegment {
                    path_type: ItadPathType::Sequence,
                    itads: vec![100, 200],
                }]),
            },
            Attribute {
                flags: AttrFlags::default(),
                ls_encap: None,
                kind: AttributeKind::AtomicAggregate,
            },
            Attribute {
                flags: AttrFlags::default(),
                ls_encap: None,
                kind: AttributeKind::LocalPreference(100),
            },
            Attribute {
                flags: AttrFlags::default(),
                ls_encap: None,
                kind: AttributeKind::Communities(vec![
                    Community { itad: 5, id: 1 },
                    Community { itad: 0, id: 0xFFFF_FF01 },
                ]),
            },
            Attribute {
                flags: AttrFlags { lsencap: true, ..Default::default() },
                ls_encap: Some(trip_ls_codec::message::LsEncap { originator_id: 9, sequence: 1 }),
                kind: AttributeKind::ItadTopology(vec![TopologyLink { neighbor_itad: 42, metric: 10 }]),
            },
            Attribute {
                flags: AttrFlags::default(),
                ls_encap: None,
                kind: AttributeKind::Unknown(200, vec![0xAA, 0xBB]),
            },
        ],
    };
    let msg = Msg::Update(update);

    let mut buf = [0u8; 1024];
    let n = msg.encode(&mut buf)?;
    let (decoded, consumed) = Msg::decode(&buf[..n])?;
    assert_eq!(consumed, n);
    assert_eq!(decoded, msg);
    Ok(())
}

// P2: bounded writes.

#[test]
fn encode_respects_capacity() {
    let msg = Msg::Open(Open { version: 1, hold: 30, itad: 1, router_id: 1, capabilities: vec![] });
    let mut small = [0u8; 4];
    assert_eq!(msg.encode(&mut small), Err(Error::BufTooSmall));

    let mut exact = [0u8; 15];
    let n = msg.encode(&mut exact).unwrap();
    assert!(n <= exact.len());
    assert_eq!(n, 15);
}

// P3/P4: validation and byte order.

#[test]
fn rejects_bad_open_version() {
    let msg = Msg::Open(Open { version: 2, hold: 30, itad: 1, router_id: 1, capabilities: vec![] });
    let mut buf = [0u8; 64];
    assert_eq!(msg.encode(&mut buf), Err(Error::Version));
}

#[test]
fn rejects_invalid_hold() {
    let msg = Msg::Open(Open { version: 1, hold: 2, itad: 1, router_id: 1, capabilities: vec![] });
    let mut buf = [0u8; 64];
    assert_eq!(msg.encode(&mut buf), Err(Error::Hold));
}

#[test]
fn rejects_zero_itad() {
    let msg = Msg::Open(Open { version: 1, hold: 30, itad: 0, router_id: 1, capabilities: vec![] });
    let mut buf = [0u8; 64];
    assert_eq!(msg.encode(&mut buf), Err(Error::Itad));
}

#[test]
fn rejects_unknown_message_type() {
    let bytes = [0x00, 0x00, 0x09];
    assert_eq!(Msg::decode(&bytes), Err(Error::MsgType));
}

#[test]
fn incomplete_header_requests_more_bytes() {
    assert_eq!(Msg::decode(&[0x00]), Err(Error::Incomplete));
}

#[test]
fn incomplete_payload_requests_more_bytes() {
    // Header claims 10 payload bytes but only 2 are present.
    let bytes = [0x00, 0x0A, 0x04, 0x01, 0x02];
    assert_eq!(Msg::decode(&bytes), Err(Error::Incomplete));
}

#[test]
fn peek_len_does_not_require_full_payload() {
    let bytes = [0x00, 0x0A, 0x04, 0x01, 0x02];
    assert_eq!(Msg::peek_len(&bytes).unwrap(), 13);
}

#[test]
fn rejects_attribute_missing_well_known_flag() {
    let update = Update {
        attributes: vec![Attribute {
            flags: AttrFlags::default(),
            ls_encap: None,
            kind: AttributeKind::NextHopServer(NextHop { address_family: 1, address: vec![1, 2, 3, 4] }),
        }],
    };
    let mut buf = [0u8; 64];
    assert_eq!(update.encode(&mut buf), Err(Error::MissingWellKnown));
}

#[test]
fn rejects_bad_community_itad() {
    let update = Update {
        attributes: vec![Attribute {
            flags: AttrFlags::default(),
            ls_encap: None,
            kind: AttributeKind::Communities(vec![Community { itad: 0, id: 1 }]),
        }],
    };
    let mut buf = [0u8; 64];
    assert_eq!(update.encode(&mut buf), Err(Error::CommunityItad));
}

#[test]
fn notification_subcode_must_match_code() {
    let notif = Notification {
        code: trip_ls_codec::message::notification::Code::HoldExpired,
        subcode: 1,
        data: vec![],
    };
    let mut buf = [0u8; 16];
    assert_eq!(notif.encode(&mut buf), Err(Error::NotifSubcode));
}
