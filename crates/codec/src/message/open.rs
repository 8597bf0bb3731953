//! The Open message: the first message sent on a session, negotiating hold
//! time, the sender's ITAD and router id, and the routes it is willing to
//! carry via capability advertisement.

use crate::cursor::{Cursor, Reader};
use crate::Error;

const OPT_TYPE_CAPABILITY_INFO: u8 = 2;

const CAP_ROUTE_TYPE: u8 = 1;
const CAP_TRANS_MODE: u8 = 2;

/// One `(address family, application protocol)` pair a `RouteType`
/// capability advertises support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTypeEntry {
    pub address_family: u16,
    pub app_protocol: u16,
}

/// Direction of route flow a peer supports on this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TransMode {
    SendRecv = 1,
    Send = 2,
    Recv = 3,
}

impl TransMode {
    fn from_u32(v: u32) -> Result<Self, Error> {
        match v {
            1 => Ok(Self::SendRecv),
            2 => Ok(Self::Send),
            3 => Ok(Self::Recv),
            _ => Err(Error::Trans),
        }
    }
}

/// A single capability record carried inside the `CapabilityInfo` optional
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    RouteType(Vec<RouteTypeEntry>),
    TransMode(TransMode),
}

pub(crate) fn validate_af(af: u16) -> Result<(), Error> {
    if (1..=16).contains(&af) {
        Ok(())
    } else {
        Err(Error::Af)
    }
}

pub(crate) fn validate_app_proto(app: u16) -> Result<(), Error> {
    if (1..=2).contains(&app) || app == 32768 {
        Ok(())
    } else {
        Err(Error::AppProto)
    }
}

impl Capability {
    fn code(&self) -> u8 {
        match self {
            Capability::RouteType(_) => CAP_ROUTE_TYPE,
            Capability::TransMode(_) => CAP_TRANS_MODE,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Capability::RouteType(entries) => entries.len() * 4,
            Capability::TransMode(_) => 4,
        }
    }

    fn encode(&self, c: &mut Cursor) -> Result<(), Error> {
        c.put_u8(self.code())?;
        let len = self.encoded_len();
        if len > u8::MAX as usize {
            return Err(Error::Buf);
        }
        c.put_u8(len as u8)?;
        match self {
            Capability::RouteType(entries) => {
                if entries.is_empty() {
                    return Err(Error::Buf);
                }
                for e in entries {
                    validate_af(e.address_family)?;
                    validate_app_proto(e.app_protocol)?;
                    c.put_u16(e.address_family)?;
                    c.put_u16(e.app_protocol)?;
                }
            }
            Capability::TransMode(mode) => c.put_u32(*mode as u32)?,
        }
        Ok(())
    }

    fn decode(r: &mut Reader) -> Result<Self, Error> {
        let code = r.get_u8()?;
        let len = r.get_u8()? as usize;
        let value = r.get_bytes(len)?;
        let mut vr = Reader::new(value);
        match code {
            CAP_ROUTE_TYPE => {
                if len == 0 || len % 4 != 0 {
                    return Err(Error::Buf);
                }
                let mut entries = Vec::with_capacity(len / 4);
                while !vr.is_empty() {
                    let address_family = vr.get_u16()?;
                    let app_protocol = vr.get_u16()?;
                    validate_af(address_family)?;
                    validate_app_proto(app_protocol)?;
                    entries.push(RouteTypeEntry { address_family, app_protocol });
                }
                Ok(Capability::RouteType(entries))
            }
            CAP_TRANS_MODE => {
                if len != 4 {
                    return Err(Error::Buf);
                }
                Ok(Capability::TransMode(TransMode::from_u32(vr.get_u32()?)?))
            }
            _ => Err(Error::CapinfoCode),
        }
    }
}

/// The Open message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    pub version: u8,
    pub hold: u16,
    pub itad: u32,
    pub router_id: u32,
    pub capabilities: Vec<Capability>,
}

fn validate_hold(hold: u16) -> Result<(), Error> {
    if hold == 0 || hold >= 3 {
        Ok(())
    } else {
        Err(Error::Hold)
    }
}

impl Open {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.version != 1 {
            return Err(Error::Version);
        }
        validate_hold(self.hold)?;
        if self.itad == 0 {
            return Err(Error::Itad);
        }

        let mut c = Cursor::new(buf);
        c.put_u8(self.version)?;
        c.put_u16(self.hold)?;
        c.put_u32(self.itad)?;
        c.put_u32(self.router_id)?;

        let opt_len_at = c.put_u8_placeholder()?;
        let opt_start = c.position();

        if !self.capabilities.is_empty() {
            c.put_u8(OPT_TYPE_CAPABILITY_INFO)?;
            let cap_len_at = c.put_u8_placeholder()?;
            let cap_start = c.position();
            for cap in &self.capabilities {
                cap.encode(&mut c)?;
            }
            let cap_len = c.position() - cap_start;
            if cap_len > u8::MAX as usize {
                return Err(Error::Buf);
            }
            c.patch_u8(cap_len_at, cap_len as u8);
        }

        let opt_len = c.position() - opt_start;
        if opt_len > u8::MAX as usize {
            return Err(Error::Buf);
        }
        c.patch_u8(opt_len_at, opt_len as u8);

        Ok(c.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes);
        let version = r.get_u8()?;
        if version != 1 {
            return Err(Error::Version);
        }
        let hold = r.get_u16()?;
        validate_hold(hold)?;
        let itad = r.get_u32()?;
        if itad == 0 {
            return Err(Error::Itad);
        }
        let router_id = r.get_u32()?;

        let opt_len = r.get_u8()? as usize;
        let opt_bytes = r.get_bytes(opt_len)?;
        let mut or_ = Reader::new(opt_bytes);

        let mut capabilities = Vec::new();
        while !or_.is_empty() {
            let ptype = or_.get_u8()?;
            let plen = or_.get_u8()? as usize;
            let pval = or_.get_bytes(plen)?;
            if ptype != OPT_TYPE_CAPABILITY_INFO {
                return Err(Error::Opt);
            }
            let mut pr = Reader::new(pval);
            while !pr.is_empty() {
                capabilities.push(Capability::decode(&mut pr)?);
            }
        }

        Ok(Open { version, hold, itad, router_id, capabilities })
    }
}
