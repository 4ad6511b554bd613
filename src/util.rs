//! Internal utilities.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use socket2::{Domain, Protocol, Socket, Type};
use subtle::ConstantTimeEq;
use tokio::net::UdpSocket;

use crate::error::{Error, Result};

/// Create and bind a UDP socket.
///
/// IPv6 sockets get `IPV6_V6ONLY` so that an IPv6 listener never sees
/// IPv4-mapped peers. `SO_REUSEADDR` stays off, so binding a port that is
/// already in use fails.
pub(crate) async fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Bind an ephemeral UDP socket of the same family as `target`.
pub(crate) async fn bind_ephemeral_udp_socket(target: SocketAddr) -> io::Result<UdpSocket> {
    let unspecified = if target.is_ipv6() {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };

    bind_udp_socket(SocketAddr::new(unspecified, 0)).await
}

/// Parse `host:port`, `[v6]:port` or `host/port`.
///
/// The slash form is how agents advertise themselves inside a trap. Host
/// names are resolved and the first result wins.
///
/// ```
/// use snmp_alarm::parse_address;
///
/// let a = parse_address("127.0.0.1/1610").unwrap();
/// let b = parse_address("127.0.0.1:1610").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_address("127.0.0.1").is_err());
/// ```
pub fn parse_address(text: &str) -> Result<SocketAddr> {
    let invalid = || Error::InvalidAddress(text.into()).boxed();

    if let Ok(addr) = text.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let (host, port) = match text.rsplit_once('/') {
        Some((host, port)) => (host, port),
        None => text.rsplit_once(':').ok_or_else(invalid)?,
    };
    let port: u16 = port.parse().map_err(|_| invalid())?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(invalid)
}

/// Render an address in the `host/port` form carried inside traps.
///
/// ```
/// use snmp_alarm::format_address;
///
/// assert_eq!(format_address(&"127.0.0.1:1610".parse().unwrap()), "127.0.0.1/1610");
/// ```
pub fn format_address(addr: &SocketAddr) -> String {
    format!("{}/{}", addr.ip(), addr.port())
}

/// Compare a received community with the configured one in constant time.
pub(crate) fn community_matches(expected: &[u8], received: &[u8]) -> bool {
    expected.len() == received.len() && bool::from(expected.ct_eq(received))
}

/// Lowercase hex encoding.
pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}
