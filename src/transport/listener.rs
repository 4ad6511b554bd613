//! Receive side of the transport.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::CommunityMessage;
use crate::util::{bind_udp_socket, parse_address};

/// A decoded datagram and the address it came from.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub message: CommunityMessage,
    pub source: SocketAddr,
}

/// A bound UDP endpoint that yields decoded messages until stopped.
///
/// Clones share the socket and the stop signal.
#[derive(Clone)]
pub struct Listener {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl Listener {
    /// Bind to `addr` (`host:port` or `host/port`).
    ///
    /// Both an unparsable address and an OS-level bind failure (port in
    /// use, address not local) are reported as [`Error::Bind`].
    pub async fn bind(addr: &str) -> Result<Self> {
        let parsed = parse_address(addr).map_err(|_| {
            Error::Bind {
                addr: addr.into(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "unparsable address"),
            }
            .boxed()
        })?;
        Self::bind_addr(parsed).await
    }

    /// Bind to an already parsed address.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let socket = bind_udp_socket(addr).await.map_err(|source| {
            Error::Bind {
                addr: addr.to_string().into(),
                source,
            }
            .boxed()
        })?;
        let local_addr = socket.local_addr().map_err(|source| {
            Error::Bind {
                addr: addr.to_string().into(),
                source,
            }
            .boxed()
        })?;

        tracing::debug!(target: "snmp_alarm::transport", { snmp.local_addr = %local_addr }, "listener bound");

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop when `token` is cancelled, in addition to [`stop`](Self::stop).
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The bound address (useful after binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the listener. A pending [`recv`](Self::recv) returns `None`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the next well-formed message.
    ///
    /// Undecodable datagrams are logged and skipped; socket errors are
    /// logged and the wait continues. Returns `None` once stopped.
    pub async fn recv(&self) -> Option<Inbound> {
        let mut buf = vec![0u8; 65535];

        loop {
            let (len, source) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(target: "snmp_alarm::transport", { error = %e }, "recv error");
                        continue;
                    }
                },
            };

            let data = Bytes::copy_from_slice(&buf[..len]);
            match CommunityMessage::decode_with_target(data, source) {
                Ok(message) => {
                    tracing::trace!(
                        target: "snmp_alarm::transport",
                        { snmp.source = %source, snmp.bytes = len, snmp.pdu_kind = %message.pdu.kind() },
                        "received message"
                    );
                    return Some(Inbound { message, source });
                }
                Err(e) => {
                    tracing::warn!(target: "snmp_alarm::transport", { snmp.source = %source, snmp.bytes = len, error = %e }, "discarding malformed datagram");
                }
            }
        }
    }

    /// Send a datagram from the listening socket (replies to requests).
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        self.socket
            .send_to(data, target)
            .await
            .map_err(|source| Error::Network { target, source }.boxed())?;
        Ok(())
    }
}
