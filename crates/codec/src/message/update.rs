//! The Update message: an unordered bag of attributes describing route
//! advertisement, withdrawal, and path/community metadata.
//!
//! Attribute wire layout:
//!
//! ```text
//! { u8 flags, u8 type, u16 length, value }
//! ```
//!
//! or, when the `lsencap` flag bit is set:
//!
//! ```text
//! { u8 flags, u8 type, u16 length, u32 originator_id, u32 sequence, value }
//! ```
//!
//! `length` counts every byte after the length field itself, i.e. the
//! link-state header (when present) plus the value.

use super::open::{validate_af, validate_app_proto};
use crate::cursor::{Cursor, Reader};
use crate::Error;

const FLAG_WELL_KNOWN: u8 = 1 << 0;
const FLAG_TRANSITIVE: u8 = 1 << 1;
const FLAG_DEPENDENT: u8 = 1 << 2;
const FLAG_PARTIAL: u8 = 1 << 3;
const FLAG_LSENCAP: u8 = 1 << 4;

const TYPE_WITHDRAWN_ROUTES: u8 = 1;
const TYPE_REACHABLE_ROUTES: u8 = 2;
const TYPE_NEXT_HOP_SERVER: u8 = 3;
const TYPE_ADVERTISEMENT_PATH: u8 = 4;
const TYPE_ROUTED_PATH: u8 = 5;
const TYPE_ATOMIC_AGGREGATE: u8 = 6;
const TYPE_LOCAL_PREFERENCE: u8 = 7;
const TYPE_MULTI_EXIT_DISC: u8 = 8;
const TYPE_COMMUNITIES: u8 = 9;
const TYPE_ITAD_TOPOLOGY: u8 = 10;
const TYPE_CONVERTED_ROUTE: u8 = 11;

const WELL_KNOWN_RANGE: std::ops::RangeInclusive<u8> = TYPE_WITHDRAWN_ROUTES..=TYPE_NEXT_HOP_SERVER;

const NO_EXPORT: u32 = 0xFFFF_FF01;

/// The five flag bits carried by every attribute header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrFlags {
    pub well_known: bool,
    pub transitive: bool,
    pub dependent: bool,
    pub partial: bool,
    pub lsencap: bool,
}

impl AttrFlags {
    fn to_u8(self) -> u8 {
        let mut v = 0;
        if self.well_known {
            v |= FLAG_WELL_KNOWN;
        }
        if self.transitive {
            v |= FLAG_TRANSITIVE;
        }
        if self.dependent {
            v |= FLAG_DEPENDENT;
        }
        if self.partial {
            v |= FLAG_PARTIAL;
        }
        if self.lsencap {
            v |= FLAG_LSENCAP;
        }
        v
    }

    fn from_u8(v: u8) -> Self {
        Self {
            well_known: v & FLAG_WELL_KNOWN != 0,
            transitive: v & FLAG_TRANSITIVE != 0,
            dependent: v & FLAG_DEPENDENT != 0,
            partial: v & FLAG_PARTIAL != 0,
            lsencap: v & FLAG_LSENCAP != 0,
        }
    }
}

/// The link-state encapsulation header, present when `flags.lsencap` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsEncap {
    pub originator_id: u32,
    pub sequence: u32,
}

/// `Set` is an unordered collection of ITADs that were merged (e.g. by
/// aggregation); `Sequence` preserves traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItadPathType {
    Set = 1,
    Sequence = 2,
}

impl ItadPathType {
    fn from_u8(v: u8) -> Result<Self, Error> {
        match v {
            1 => Ok(Self::Set),
            2 => Ok(Self::Sequence),
            _ => Err(Error::ItadPathType),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItadPathSegment {
    pub path_type: ItadPathType,
    pub itads: Vec<u32>,
}

/// One telephony destination prefix: a variable-length bitstring over the
/// given address family/application protocol, padded to a whole octet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub address_family: u16,
    pub app_protocol: u16,
    pub route_len_bits: u8,
    pub value: Vec<u8>,
}

impl Route {
    fn byte_len(&self) -> usize {
        (self.route_len_bits as usize).div_ceil(8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    pub address_family: u16,
    pub address: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Community {
    pub itad: u32,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyLink {
    pub neighbor_itad: u32,
    pub metric: u16,
}

/// The decoded body of an attribute, keyed by its wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    WithdrawnRoutes(Vec<Route>),
    ReachableRoutes(Vec<Route>),
    NextHopServer(NextHop),
    AdvertisementPath(Vec<ItadPathSegment>),
    RoutedPath(Vec<ItadPathSegment>),
    AtomicAggregate,
    LocalPreference(u32),
    MultiExitDisc(u32),
    Communities(Vec<Community>),
    ItadTopology(Vec<TopologyLink>),
    ConvertedRoute(Vec<Route>),
    /// A type in `12..=255` not assigned a meaning by this specification.
    Unknown(u8, Vec<u8>),
}

impl AttributeKind {
    fn type_code(&self) -> u8 {
        match self {
            Self::WithdrawnRoutes(_) => TYPE_WITHDRAWN_ROUTES,
            Self::ReachableRoutes(_) => TYPE_REACHABLE_ROUTES,
            Self::NextHopServer(_) => TYPE_NEXT_HOP_SERVER,
            Self::AdvertisementPath(_) => TYPE_ADVERTISEMENT_PATH,
            Self::RoutedPath(_) => TYPE_ROUTED_PATH,
            Self::AtomicAggregate => TYPE_ATOMIC_AGGREGATE,
            Self::LocalPreference(_) => TYPE_LOCAL_PREFERENCE,
            Self::MultiExitDisc(_) => TYPE_MULTI_EXIT_DISC,
            Self::Communities(_) => TYPE_COMMUNITIES,
            Self::ItadTopology(_) => TYPE_ITAD_TOPOLOGY,
            Self::ConvertedRoute(_) => TYPE_CONVERTED_ROUTE,
            Self::Unknown(code, _) => *code,
        }
    }
}

/// One Update attribute: header flags, optional link-state header, and a
/// typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub flags: AttrFlags,
    pub ls_encap: Option<LsEncap>,
    pub kind: AttributeKind,
}

fn encode_routes(c: &mut Cursor, routes: &[Route]) -> Result<(), Error> {
    for r in routes {
        validate_af(r.address_family)?;
        validate_app_proto(r.app_protocol)?;
        if r.value.len() != r.byte_len() {
            return Err(Error::Buf);
        }
        c.put_u16(r.address_family)?;
        c.put_u16(r.app_protocol)?;
        c.put_u8(r.route_len_bits)?;
        c.put_bytes(&r.value)?;
    }
    Ok(())
}

fn decode_routes(r: &mut Reader) -> Result<Vec<Route>, Error> {
    let mut routes = Vec::new();
    while !r.is_empty() {
        let address_family = r.get_u16()?;
        let app_protocol = r.get_u16()?;
        validate_af(address_family)?;
        validate_app_proto(app_protocol)?;
        let route_len_bits = r.get_u8()?;
        let route = Route { address_family, app_protocol, route_len_bits, value: Vec::new() };
        let value = r.get_bytes(route.byte_len())?.to_vec();
        routes.push(Route { value, ..route });
    }
    Ok(routes)
}

fn encode_paths(c: &mut Cursor, segments: &[ItadPathSegment]) -> Result<(), Error> {
    for seg in segments {
        if seg.itads.len() > u8::MAX as usize {
            return Err(Error::Buf);
        }
        c.put_u8(seg.path_type as u8)?;
        c.put_u8(seg.itads.len() as u8)?;
        for itad in &seg.itads {
            c.put_u32(*itad)?;
        }
    }
    Ok(())
}

fn decode_paths(r: &mut Reader) -> Result<Vec<ItadPathSegment>, Error> {
    let mut segments = Vec::new();
    while !r.is_empty() {
        let path_type = ItadPathType::from_u8(r.get_u8()?)?;
        let count = r.get_u8()? as usize;
        let mut itads = Vec::with_capacity(count);
        for _ in 0..count {
            itads.push(r.get_u32()?);
        }
        segments.push(ItadPathSegment { path_type, itads });
    }
    Ok(segments)
}

impl Attribute {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if WELL_KNOWN_RANGE.contains(&self.kind.type_code()) && !self.flags.well_known {
            return Err(Error::MissingWellKnown);
        }
        if self.flags.lsencap != self.ls_encap.is_some() {
            return Err(Error::MissingLsEncap);
        }

        let mut c = Cursor::new(buf);
        c.put_u8(self.flags.to_u8())?;
        c.put_u8(self.kind.type_code())?;
        let len_at = c.put_u16_placeholder()?;
        let body_start = c.position();

        if let Some(ls) = self.ls_encap {
            c.put_u32(ls.originator_id)?;
            c.put_u32(ls.sequence)?;
        }

        match &self.kind {
            AttributeKind::WithdrawnRoutes(routes)
            | AttributeKind::ReachableRoutes(routes)
            | AttributeKind::ConvertedRoute(routes) => encode_routes(&mut c, routes)?,
            AttributeKind::NextHopServer(next_hop) => {
                validate_af(next_hop.address_family)?;
                c.put_u16(next_hop.address_family)?;
                c.put_bytes(&next_hop.address)?;
            }
            AttributeKind::AdvertisementPath(segments) | AttributeKind::RoutedPath(segments) => {
                encode_paths(&mut c, segments)?
            }
            AttributeKind::AtomicAggregate => {}
            AttributeKind::LocalPreference(v) | AttributeKind::MultiExitDisc(v) => c.put_u32(*v)?,
            AttributeKind::Communities(pairs) => {
                for p in pairs {
                    if p.itad == 0 && p.id != NO_EXPORT {
                        return Err(Error::CommunityItad);
                    }
                    c.put_u32(p.itad)?;
                    c.put_u32(p.id)?;
                }
            }
            AttributeKind::ItadTopology(links) => {
                for l in links {
                    c.put_u32(l.neighbor_itad)?;
                    c.put_u16(l.metric)?;
                }
            }
            AttributeKind::Unknown(code, raw) => {
                if WELL_KNOWN_RANGE.contains(code) {
                    return Err(Error::AttrType);
                }
                c.put_bytes(raw)?;
            }
        }

        let body_len = c.position() - body_start;
        if body_len > u16::MAX as usize {
            return Err(Error::Buf);
        }
        c.patch_u16(len_at, body_len as u16);

        Ok(c.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = Reader::new(bytes);
        let flags = AttrFlags::from_u8(r.get_u8()?);
        let type_code = r.get_u8()?;
        if WELL_KNOWN_RANGE.contains(&type_code) && !flags.well_known {
            return Err(Error::MissingWellKnown);
        }

        let body_len = r.get_u16()? as usize;
        let body = r.get_bytes(body_len)?;
        let mut br = Reader::new(body);

        let ls_encap = if flags.lsencap {
            if br.remaining() < 8 {
                return Err(Error::MissingLsEncap);
            }
            Some(LsEncap { originator_id: br.get_u32()?, sequence: br.get_u32()? })
        } else {
            None
        };

        let kind = match type_code {
            TYPE_WITHDRAWN_ROUTES => AttributeKind::WithdrawnRoutes(decode_routes(&mut br)?),
            TYPE_REACHABLE_ROUTES => AttributeKind::ReachableRoutes(decode_routes(&mut br)?),
            TYPE_NEXT_HOP_SERVER => {
                let address_family = br.get_u16()?;
                validate_af(address_family)?;
                let address = br.get_bytes(br.remaining())?.to_vec();
                AttributeKind::NextHopServer(NextHop { address_family, address })
            }
            TYPE_ADVERTISEMENT_PATH => AttributeKind::AdvertisementPath(decode_paths(&mut br)?),
            TYPE_ROUTED_PATH => AttributeKind::RoutedPath(decode_paths(&mut br)?),
            TYPE_ATOMIC_AGGREGATE => {
                if !br.is_empty() {
                    return Err(Error::Buf);
                }
                AttributeKind::AtomicAggregate
            }
            TYPE_LOCAL_PREFERENCE => AttributeKind::LocalPreference(br.get_u32()?),
            TYPE_MULTI_EXIT_DISC => AttributeKind::MultiExitDisc(br.get_u32()?),
            TYPE_COMMUNITIES => {
                let mut pairs = Vec::new();
                while !br.is_empty() {
                    let itad = br.get_u32()?;
                    let id = br.get_u32()?;
                    if itad == 0 && id != NO_EXPORT {
                        return Err(Error::CommunityItad);
                    }
                    pairs.push(Community { itad, id });
                }
                AttributeKind::Communities(pairs)
            }
            TYPE_ITAD_TOPOLOGY => {
                let mut links = Vec::new();
                while !br.is_empty() {
                    let neighbor_itad = br.get_u32()?;
                    let metric = br.get_u16()?;
                    links.push(TopologyLink { neighbor_itad, metric });
                }
                AttributeKind::ItadTopology(links)
            }
            TYPE_CONVERTED_ROUTE => AttributeKind::ConvertedRoute(decode_routes(&mut br)?),
            code => AttributeKind::Unknown(code, br.get_bytes(br.remaining())?.to_vec()),
        };

        Ok((Attribute { flags, ls_encap, kind }, 4 + body_len))
    }
}

/// The Update message payload: an unordered bag of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Update {
    pub attributes: Vec<Attribute>,
}

impl Update {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut pos = 0;
        for attr in &self.attributes {
            pos += attr.encode(&mut buf[pos..])?;
        }
        Ok(pos)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut attributes = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let (attr, consumed) = Attribute::decode(&bytes[pos..])?;
            attributes.push(attr);
            pos += consumed;
        }
        Ok(Update { attributes })
    }
}
