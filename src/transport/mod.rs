//! Datagram transport.
//!
//! [`Transport`] is the client-side seam: fire-and-forget delivery for
//! traps, request/response with timeout for GET. [`Listener`] is the
//! receiving side shared by the manager (traps) and the agent (GETs).

mod listener;
mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use listener::{Inbound, Listener};
pub use udp::UdpTransport;

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockReply, MockTransport};

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::ber::tag;
use crate::ber::length::decode_length;
use crate::error::Result;

/// Client-side transport abstraction.
///
/// Implementations carry bytes only; encoding, retries and response
/// validation live in [`Client`](crate::client::Client).
///
/// # Clone Requirement
///
/// Each correlation runs in its own task holding a clone of the client and
/// so of the transport. Implementations keep shared state behind `Arc`.
pub trait Transport: Send + Sync + Clone + 'static {
    /// Hand `data` to the network for `target` without awaiting a reply.
    fn send(&self, data: Bytes, target: SocketAddr) -> impl Future<Output = Result<()>> + Send;

    /// Send `data` to `target` and wait for the datagram whose request id
    /// is `request_id`.
    ///
    /// Answers to other request ids (late replies to an earlier attempt)
    /// are discarded. Fails with [`Error::Timeout`](crate::Error::Timeout)
    /// when nothing matching arrives within `timeout`, and with
    /// [`Error::Unreachable`](crate::Error::Unreachable) when delivery
    /// fails outright.
    fn request(
        &self,
        data: Bytes,
        target: SocketAddr,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Read the request id of a community message without decoding it.
///
/// Layout: `SEQUENCE { INTEGER version, OCTET STRING community,
/// [PDU] { INTEGER request-id, ... } }`.
pub(crate) fn extract_request_id(data: &[u8]) -> Option<i32> {
    let mut pos = enter(data, 0, tag::universal::SEQUENCE)?;
    pos = skip(data, pos, tag::universal::INTEGER)?;
    pos = skip(data, pos, tag::universal::OCTET_STRING)?;

    let pdu_tag = *data.get(pos)?;
    if !(tag::pdu::GET_REQUEST..=tag::pdu::TRAP_V2).contains(&pdu_tag) {
        return None;
    }
    pos = enter(data, pos, pdu_tag)?;

    if *data.get(pos)? != tag::universal::INTEGER {
        return None;
    }
    let (len, consumed) = decode_length(data.get(pos + 1..)?).ok()?;
    let start = pos + 1 + consumed;
    let bytes = data.get(start..start.checked_add(len)?)?;
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }

    let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in bytes {
        value = (value << 8) | i32::from(byte);
    }
    Some(value)
}

/// Step past a constructed header, returning the offset of its content.
fn enter(data: &[u8], pos: usize, expected: u8) -> Option<usize> {
    if *data.get(pos)? != expected {
        return None;
    }
    let (_, consumed) = decode_length(data.get(pos + 1..)?).ok()?;
    Some(pos + 1 + consumed)
}

/// Step past a whole primitive TLV.
fn skip(data: &[u8], pos: usize, expected: u8) -> Option<usize> {
    let content = enter(data, pos, expected)?;
    let (len, _) = decode_length(data.get(pos + 1..)?).ok()?;
    content.checked_add(len).filter(|&end| end <= data.len())
}
