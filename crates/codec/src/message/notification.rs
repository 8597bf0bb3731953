//! The Notification message: closes a session, carrying a (code, subcode)
//! pair and optional diagnostic data.

use crate::cursor::{Cursor, Reader};
use crate::Error;

/// Top-level notification code. Mirrors RFC 3219 §6's six codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    MsgError = 1,
    OpenError = 2,
    UpdateError = 3,
    HoldExpired = 4,
    FsmError = 5,
    Cease = 6,
}

impl Code {
    fn from_u8(v: u8) -> Result<Self, Error> {
        match v {
            1 => Ok(Self::MsgError),
            2 => Ok(Self::OpenError),
            3 => Ok(Self::UpdateError),
            4 => Ok(Self::HoldExpired),
            5 => Ok(Self::FsmError),
            6 => Ok(Self::Cease),
            _ => Err(Error::NotifCode),
        }
    }

    /// Returns the set of subcodes valid for this code. Codes 4, 5 and 6
    /// carry no subcode; by convention the wire subcode byte is 0 for them.
    fn valid_subcode(self, subcode: u8) -> bool {
        match self {
            Code::MsgError => (1..=2).contains(&subcode),
            Code::OpenError => (1..=7).contains(&subcode),
            Code::UpdateError => (1..=6).contains(&subcode),
            Code::HoldExpired | Code::FsmError | Code::Cease => subcode == 0,
        }
    }
}

/// The Notification message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub code: Code,
    pub subcode: u8,
    pub data: Vec<u8>,
}

impl Notification {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.code.valid_subcode(self.subcode) {
            return Err(Error::NotifSubcode);
        }

        let mut c = Cursor::new(buf);
        c.put_u8(self.code as u8)?;
        c.put_u8(self.subcode)?;
        c.put_bytes(&self.data)?;
        Ok(c.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes);
        let code = Code::from_u8(r.get_u8()?)?;
        let subcode = r.get_u8()?;
        if !code.valid_subcode(subcode) {
            return Err(Error::NotifSubcode);
        }
        let data = r.get_bytes(r.remaining())?.to_vec();
        Ok(Notification { code, subcode, data })
    }
}
