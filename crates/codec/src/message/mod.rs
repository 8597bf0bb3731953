//! The four TRIP message types and their shared 3-octet header.
//!
//! ```text
//!  0                   1                   2
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            Length             |     Type      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                |
//! ~                     Payload                    ~
//! |                                                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `Length` counts only the payload, so a message with no body (Keepalive)
//! is exactly the 3-byte header.

pub mod notification;
pub mod open;
pub mod update;

pub use notification::Notification;
pub use open::{Capability, Open, RouteTypeEntry, TransMode};
pub use update::{
    Attribute, AttrFlags, AttributeKind, Community, ItadPathSegment, ItadPathType, LsEncap,
    NextHop, Route, TopologyLink, Update,
};

use crate::Error;

pub const HEADER_LEN: usize = 3;

const TYPE_OPEN: u8 = 1;
const TYPE_UPDATE: u8 = 2;
const TYPE_NOTIFICATION: u8 = 3;
const TYPE_KEEPALIVE: u8 = 4;

/// A decoded TRIP message, tagged by the wire type byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Open(Open),
    Update(Update),
    Notification(Notification),
    Keepalive,
}

impl Msg {
    /// Serializes `self` into `buf`, returning the number of bytes written
    /// (header included). Never allocates.
    ///
    /// # Test
    ///
    /// ```
    /// use trip_ls_codec::message::Msg;
    ///
    /// let mut buf = [0u8; 8];
    /// let n = Msg::Keepalive.encode(&mut buf).unwrap();
    /// assert_eq!(n, 3);
    ///
    /// let (msg, consumed) = Msg::decode(&buf[..n]).unwrap();
    /// assert_eq!(consumed, n);
    /// assert_eq!(msg, Msg::Keepalive);
    /// ```
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::BufTooSmall);
        }

        let (ty, payload_len) = match self {
            Msg::Open(open) => (TYPE_OPEN, open.encode(&mut buf[HEADER_LEN..])?),
            Msg::Update(update) => (TYPE_UPDATE, update.encode(&mut buf[HEADER_LEN..])?),
            Msg::Notification(n) => (TYPE_NOTIFICATION, n.encode(&mut buf[HEADER_LEN..])?),
            Msg::Keepalive => (TYPE_KEEPALIVE, 0),
        };

        if payload_len > u16::MAX as usize {
            return Err(Error::Buf);
        }

        buf[0..2].copy_from_slice(&(payload_len as u16).to_be_bytes());
        buf[2] = ty;
        Ok(HEADER_LEN + payload_len)
    }

    /// Returns the total byte length (header + payload) the next message in
    /// `bytes` will occupy once fully received, without parsing the
    /// payload. Lets a session frame its receive buffer before paying the
    /// cost of a full decode.
    pub fn peek_len(bytes: &[u8]) -> Result<usize, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Incomplete);
        }
        let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        Ok(HEADER_LEN + len)
    }

    /// Parses one message from the front of `bytes`, returning it along
    /// with the number of bytes consumed. Returns `Error::Incomplete` if
    /// `bytes` does not yet hold a full message; the caller should read
    /// more and retry from the same offset.
    pub fn decode(bytes: &[u8]) -> Result<(Msg, usize), Error> {
        let total = Self::peek_len(bytes)?;
        if bytes.len() < total {
            return Err(Error::Incomplete);
        }

        let ty = bytes[2];
        let payload = &bytes[HEADER_LEN..total];

        let msg = match ty {
            TYPE_OPEN => Msg::Open(Open::decode(payload)?),
            TYPE_UPDATE => Msg::Update(Update::decode(payload)?),
            TYPE_NOTIFICATION => Msg::Notification(Notification::decode(payload)?),
            TYPE_KEEPALIVE => {
                if !payload.is_empty() {
                    return Err(Error::Buf);
                }
                Msg::Keepalive
            }
            _ => return Err(Error::MsgType),
        };

        Ok((msg, total))
    }
}
