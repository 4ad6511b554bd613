//! Detailed error kinds that are logged but never returned.
//!
//! Decode and OID failures carry more detail than a caller can act on. The
//! detail goes to `tracing` at debug level and the caller receives
//! [`Error::MalformedPdu`](super::Error::MalformedPdu) or
//! [`Error::InvalidOid`](super::Error::InvalidOid).

use super::EncodeErrorKind;

/// Why a buffer failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DecodeErrorKind {
    /// Expected different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data truncated unexpectedly.
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length not supported.
    IndefiniteLength,
    /// Length field too long.
    LengthTooLong { octets: usize },
    /// Length exceeds maximum.
    LengthExceedsMax { length: usize, max: usize },
    /// Insufficient data for read.
    InsufficientData { needed: usize, available: usize },
    /// TLV extends past end of data.
    TlvOverflow,
    /// Zero-length integer.
    ZeroLengthInteger,
    /// NULL with non-zero length.
    InvalidNull,
    /// Invalid OID encoding.
    InvalidOidEncoding(OidErrorKind),
    /// Version number other than v1 or v2c.
    UnknownVersion(i32),
    /// PDU tag that is not GET, GET response or TRAP.
    UnknownPduType(u8),
    /// Value tag this crate does not model.
    UnknownValueTag(u8),
    /// Bytes left over after the outermost element.
    TrailingData { remaining: usize },
    /// Decoded PDU violates its kind's binding invariant.
    BindingInvariant(EncodeErrorKind),
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length field uses {} octets, maximum is 4", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes, {} available", needed, available)
            }
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidOidEncoding(kind) => write!(f, "invalid OID encoding: {}", kind),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::UnknownValueTag(t) => write!(f, "unknown value tag: 0x{:02X}", t),
            Self::TrailingData { remaining } => {
                write!(f, "{} trailing bytes after message", remaining)
            }
            Self::BindingInvariant(kind) => write!(f, "{}", kind),
        }
    }
}

/// Why an OID failed to parse or decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OidErrorKind {
    /// Empty OID string.
    Empty,
    /// Fewer than two arcs.
    TooFewArcs(usize),
    /// Arc that is not a `u32`.
    InvalidArc,
    /// First arc must be 0, 1, or 2.
    InvalidFirstArc(u32),
    /// Second arc too large for first arc value.
    InvalidSecondArc { first: u32, second: u32 },
    /// OID has too many arcs.
    TooManyArcs { count: usize, max: usize },
    /// Subidentifier does not fit in a `u32`.
    SubidentifierOverflow,
    /// Last subidentifier has its continuation bit set.
    UnterminatedSubidentifier,
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::TooFewArcs(n) => write!(f, "OID has {} arc(s), needs at least 2", n),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {}", v),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {} too large for first arc {}", second, first)
            }
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::SubidentifierOverflow => write!(f, "subidentifier overflow"),
            Self::UnterminatedSubidentifier => write!(f, "unterminated subidentifier"),
        }
    }
}
