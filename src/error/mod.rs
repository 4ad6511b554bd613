//! Error types for snmp-alarm.
//!
//! This module provides:
//!
//! - [`Error`] - The main error type covering every failure mode
//! - [`ErrorStatus`] - Protocol error status carried in a GET response
//! - [`TrapDefect`] - Why a received trap could not be turned into an alarm
//! - [`EncodeErrorKind`] - Why a PDU could not be constructed
//!
//! # Error Handling
//!
//! Errors are boxed for efficiency: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use snmp_alarm::{Error, Result};
//!
//! fn handle_error(result: Result<()>) {
//!     match result {
//!         Ok(()) => println!("Success"),
//!         Err(e) => match &*e {
//!             Error::Timeout { target, retries, .. } => {
//!                 println!("{} unreachable after {} retries", target, retries);
//!             }
//!             Error::MalformedTrap { peer, defect } => {
//!                 println!("dropping trap from {}: {}", peer, defect);
//!             }
//!             _ => println!("Error: {}", e),
//!         }
//!     }
//! }
//! ```

pub(crate) mod internal;

use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;

/// Placeholder address used when no peer is known.
///
/// Decoding a buffer that did not come off the network (tests, local
/// round-trips) reports this sentinel (0.0.0.0:0) as its peer.
pub(crate) const UNKNOWN_TARGET: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

// Pattern for converting detailed internal errors to simplified public errors:
//
// tracing::debug!(
//     target: "snmp_alarm::ber",
//     { snmp.offset = 42, kind = %DecodeErrorKind::ZeroLengthInteger },
//     "decode error details here"
// );
// return Err(Error::MalformedPdu { target }.boxed());

/// Result type alias using the library's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// The main error type for all snmp-alarm operations.
///
/// Errors are boxed (via [`Result`]) to keep the size small on the stack.
///
/// # Recoverability
///
/// Only [`Error::Bind`], [`Error::Config`], [`Error::InvalidOid`] and
/// [`Error::InvalidAddress`] indicate a setup problem. Everything else is a
/// runtime condition the agent and manager loops log and survive.
///
/// ```
/// use snmp_alarm::Error;
///
/// fn agent_unreachable(error: &Error) -> bool {
///     matches!(error, Error::Timeout { .. } | Error::Unreachable { .. })
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A local endpoint could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: Box<str>,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on an open socket that is not a delivery failure.
    #[error("network error communicating with {target}: {source}")]
    Network {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out after retries.
    #[error("timeout after {elapsed:?} waiting for {target} ({retries} retries)")]
    Timeout {
        target: SocketAddr,
        elapsed: Duration,
        retries: u32,
    },

    /// The datagram could not be delivered (port unreachable, no route,
    /// address family mismatch).
    #[error("{target} unreachable: {source}")]
    Unreachable {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Bytes that do not decode to a valid message.
    #[error("malformed PDU from {target}")]
    MalformedPdu { target: SocketAddr },

    /// A well-formed trap that does not carry a usable alarm.
    #[error("malformed trap from {peer}: {defect}")]
    MalformedTrap {
        peer: SocketAddr,
        defect: TrapDefect,
    },

    /// A PDU that violates its kind's binding invariant.
    #[error("cannot encode PDU: {0}")]
    Encode(EncodeErrorKind),

    /// The agent answered with a non-zero error status.
    #[error("{target} rejected request: {status} at index {index}")]
    Rejected {
        target: SocketAddr,
        status: ErrorStatus,
        index: u32,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID format.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),

    /// Address text that is neither `host:port` nor `host/port`.
    #[error("invalid address: {0}")]
    InvalidAddress(Box<str>),
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }
}

/// Reason a trap was rejected by the manager's field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrapDefect {
    /// A required binding is absent.
    Missing(Oid),
    /// A required binding is present but not an octet string.
    WrongType(Oid),
    /// A required text field is not valid UTF-8.
    NotUtf8(Oid),
    /// The trap announces some other notification (coldStart, linkDown, ...).
    UnknownNotification(Oid),
}

impl std::fmt::Display for TrapDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(oid) => write!(f, "missing binding {}", oid),
            Self::WrongType(oid) => write!(f, "binding {} is not an octet string", oid),
            Self::NotUtf8(oid) => write!(f, "binding {} is not UTF-8 text", oid),
            Self::UnknownNotification(oid) => write!(f, "unhandled notification {}", oid),
        }
    }
}

/// Reason a PDU could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeErrorKind {
    /// A trap without an `snmpTrapOID.0` binding holding an OID.
    MissingTrapOid,
    /// A GET or GET response must carry exactly one binding.
    BindingCount { expected: usize, actual: usize },
    /// A GET binding must hold NULL.
    NonNullRequest,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTrapOid => write!(f, "trap lacks an snmpTrapOID.0 binding"),
            Self::BindingCount { expected, actual } => {
                write!(f, "expected {} binding(s), got {}", expected, actual)
            }
            Self::NonNullRequest => write!(f, "GET binding must be NULL"),
        }
    }
}

/// Error status codes a responder can report (RFC 3416).
///
/// A GET only ever produces the SNMPv1-era codes. Anything else is kept
/// verbatim in [`ErrorStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    /// Operation completed successfully (status = 0).
    NoError,
    /// Response message would be too large for transport (status = 1).
    TooBig,
    /// Requested OID not found (status = 2).
    NoSuchName,
    /// Invalid value (status = 3).
    BadValue,
    /// Attempted to modify a read-only object (status = 4).
    ReadOnly,
    /// Unspecified error occurred (status = 5).
    GenErr,
    /// Any other status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}
