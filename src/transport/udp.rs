//! UDP transport implementation.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::{Transport, extract_request_id};
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

/// Largest datagram accepted in reply to a request.
const MAX_DATAGRAM: usize = 65535;

/// UDP transport.
///
/// Every request runs on its own ephemeral, unconnected socket, so
/// concurrent correlations never see each other's replies. Only datagrams
/// whose source is the target are considered.
///
/// An ICMP refusal is not a delivery failure here: a closed port looks the
/// same as a silent agent and the attempt ends in [`Error::Timeout`], so
/// the caller's retry budget applies. [`Error::Unreachable`] is reserved
/// for sends the OS rejects outright (no route, address family mismatch).
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    _private: (),
}

impl UdpTransport {
    /// Create a UDP transport.
    pub fn new() -> Self {
        Self::default()
    }

    async fn open(target: SocketAddr) -> Result<UdpSocket> {
        bind_ephemeral_udp_socket(target)
            .await
            .map_err(|source| Error::Network { target, source }.boxed())
    }

    async fn send_on(socket: &UdpSocket, data: &[u8], target: SocketAddr) -> Result<()> {
        socket
            .send_to(data, target)
            .await
            .map_err(|source| send_error(target, source))?;
        Ok(())
    }
}

/// Classify a send-side I/O failure.
fn send_error(target: SocketAddr, source: io::Error) -> Box<Error> {
    match source.kind() {
        io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::Unsupported => Error::Unreachable { target, source }.boxed(),
        _ => Error::Network { target, source }.boxed(),
    }
}

/// Receive errors that only echo an ICMP refusal of an earlier datagram.
fn is_refusal(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

impl Transport for UdpTransport {
    async fn send(&self, data: Bytes, target: SocketAddr) -> Result<()> {
        let socket = Self::open(target).await?;
        tracing::trace!(target: "snmp_alarm::transport", { snmp.target = %target, snmp.bytes = data.len() }, "UDP send");
        Self::send_on(&socket, &data, target).await
    }

    async fn request(
        &self,
        data: Bytes,
        target: SocketAddr,
        request_id: i32,
        timeout: Duration,
    ) -> Result<Bytes> {
        let socket = Self::open(target).await?;
        let start = Instant::now();
        let deadline = start + timeout;

        tracing::trace!(
            target: "snmp_alarm::transport",
            { snmp.target = %target, snmp.request_id = request_id, snmp.bytes = data.len() },
            "UDP request"
        );
        Self::send_on(&socket, &data, target).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, source) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) if is_refusal(&e) => {
                    tracing::debug!(target: "snmp_alarm::transport", { snmp.target = %target, snmp.request_id = request_id, error = %e }, "target refused datagram");
                    continue;
                }
                Ok(Err(source)) => return Err(Error::Network { target, source }.boxed()),
                Err(_) => {
                    tracing::trace!(target: "snmp_alarm::transport", { snmp.target = %target, snmp.request_id = request_id }, "UDP recv timeout");
                    return Err(Error::Timeout {
                        target,
                        elapsed: start.elapsed(),
                        retries: 0,
                    }
                    .boxed());
                }
            };

            if source != target {
                tracing::debug!(target: "snmp_alarm::transport", { snmp.target = %target, snmp.source = %source }, "discarding datagram from another peer");
                continue;
            }

            match extract_request_id(&buf[..len]) {
                Some(id) if id == request_id => {
                    tracing::trace!(target: "snmp_alarm::transport", { snmp.target = %target, snmp.bytes = len }, "UDP recv complete");
                    return Ok(Bytes::copy_from_slice(&buf[..len]));
                }
                other => {
                    tracing::debug!(
                        target: "snmp_alarm::transport",
                        { snmp.target = %target, snmp.request_id = request_id, snmp.received_id = ?other },
                        "discarding datagram for another request"
                    );
                }
            }
        }
    }
}
