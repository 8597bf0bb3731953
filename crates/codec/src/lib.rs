//! ## Telephony Routing over IP (TRIP)
//!
//! [RFC3219]: https://www.rfc-editor.org/rfc/rfc3219
//!
//! TRIP is a policy-driven inter-administrative-domain protocol for
//! advertising the reachability of telephony destinations between Location
//! Servers, analogous in shape to BGP but carrying telephony routes instead
//! of IP prefixes. This crate is the wire codec only: it converts between
//! in-memory messages/attributes and the RFC 3219 byte layout, and performs
//! no I/O of its own.

pub mod message;

mod cursor;

pub use cursor::Cursor;

/// Errors produced while serializing or parsing TRIP wire records.
///
/// Every codec function that can fail returns one of these instead of a raw
/// negative integer; the mapping back to a TRIP `Notification(code,
/// subcode)` is the session's job (see `message::notification`), not the
/// codec's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Encoded output would not be a well-formed record (e.g. payload too
    /// large to be represented in the length field).
    Buf,
    /// Caller-provided buffer is too small to hold the encoded record.
    BufTooSmall,
    /// Hold time outside `{0} ∪ [3, 65535]`.
    Hold,
    /// ITAD number is zero where a nonzero ITAD is required.
    Itad,
    /// Notification code outside `[1, 6]`.
    NotifCode,
    /// Notification subcode not valid for its code.
    NotifSubcode,
    /// Span shorter than the fixed header of the next record.
    Incomplete,
    /// Message type outside `[1, 4]`.
    MsgType,
    /// Open version other than 1.
    Version,
    /// Optional parameter type other than `CapabilityInfo`.
    Opt,
    /// Capability record code not recognized.
    CapinfoCode,
    /// Route address family outside the defined range.
    Af,
    /// Application protocol not in the SIP..H323-Annex-G range and not IAX2.
    AppProto,
    /// Transmission mode enum value not in `{SendRecv, Send, Recv}`.
    Trans,
    /// `Unknown` attribute built with a well-known type code; well-known
    /// types always have a named `AttributeKind` variant.
    AttrType,
    /// Attribute type in the well-known range without the well-known flag.
    MissingWellKnown,
    /// `lsencap` flag set but the expanded header does not fit.
    MissingLsEncap,
    /// ITAD path segment type other than `Set`/`Sequence`.
    ItadPathType,
    /// Community `(itad, id)` pair with ITAD 0 and `id != NO_EXPORT`.
    CommunityItad,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
