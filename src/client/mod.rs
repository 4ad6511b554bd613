//! Request side shared by both roles.
//!
//! The manager uses [`Client::get`] to query agents; the agent uses
//! [`Client::notify`] to deliver traps.

mod retry;

pub use retry::{Backoff, Retry};

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{Span, instrument};

use crate::error::{Error, ErrorStatus, Result};
use crate::message::{CommunityMessage, DEFAULT_COMMUNITY};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduKind};
use crate::transport::{Transport, UdpTransport};
use crate::util::parse_address;
use crate::varbind::VarBind;
use crate::version::Version;

/// Default time to wait for each GET attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a request goes and how it is sent.
///
/// Defaults: SNMPv2c, community `"public"`, 10 second timeout,
/// [`Retry::default`] (two retries).
///
/// ```rust
/// use snmp_alarm::{Retry, Target};
/// use std::time::Duration;
///
/// let target = Target::parse("127.0.0.1/1610")
///     .unwrap()
///     .with_timeout(Duration::from_millis(500))
///     .with_retry(Retry::none());
/// assert_eq!(target.addr.port(), 1610);
/// ```
#[derive(Clone, Debug)]
pub struct Target {
    /// Peer address
    pub addr: SocketAddr,
    /// Community string
    pub community: Bytes,
    /// Protocol version tag
    pub version: Version,
    /// Wait per attempt
    pub timeout: Duration,
    /// Retry policy on timeout
    pub retry: Retry,
}

impl Target {
    /// Target `addr` with default settings.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            community: Bytes::from_static(DEFAULT_COMMUNITY),
            version: Version::V2c,
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
        }
    }

    /// Target an address given as `host:port` or `host/port`.
    pub fn parse(addr: &str) -> Result<Self> {
        parse_address(addr).map(Self::new)
    }

    /// Set the community string.
    pub fn with_community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Set the protocol version tag.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = retry.into();
        self
    }

    /// Shorthand for [`Retry::immediate`].
    pub fn with_retries(self, retries: u32) -> Self {
        self.with_retry(Retry::immediate(retries))
    }
}

/// Request ids are unique per process; a late reply to one attempt can
/// never be mistaken for the answer to another.
static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

pub(crate) fn next_request_id() -> i32 {
    // keep ids positive
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) & i32::MAX
}

/// Request client.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Client<T: Transport = UdpTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T: Transport> {
    transport: T,
}

impl Client<UdpTransport> {
    /// Client over UDP.
    pub fn udp() -> Self {
        Self::new(UdpTransport::new())
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(ClientInner { transport }),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// GET a single OID.
    ///
    /// Each attempt is a fresh request with its own request id. Only
    /// timeouts are retried; when every attempt times out the error is
    /// [`Error::Timeout`] with `retries` set to the number of retries made.
    #[instrument(
        level = "debug",
        skip(self, target),
        err,
        fields(
            snmp.target = %target.addr,
            snmp.oid = %oid,
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    pub async fn get(&self, target: &Target, oid: &Oid) -> Result<VarBind> {
        let start = Instant::now();
        let max_attempts = target.retry.max_attempts;

        for attempt in 0..=max_attempts {
            Span::current().record("snmp.attempt", attempt);
            if attempt > 0 {
                tracing::debug!(target: "snmp_alarm::client", "retrying request");
            }

            let request_id = next_request_id();
            let data =
                CommunityMessage::new(target.version, target.community.clone(), Pdu::get(request_id, oid.clone()))
                    .encode();
            tracing::trace!(target: "snmp_alarm::client", { snmp.request_id = request_id, snmp.bytes = data.len() }, "sending request");

            match self
                .inner
                .transport
                .request(data, target.addr, request_id, target.timeout)
                .await
            {
                Ok(response) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return validate_response(target, request_id, response);
                }
                Err(e) if matches!(*e, Error::Timeout { .. }) => {
                    if attempt < max_attempts {
                        let delay = target.retry.compute_delay(attempt);
                        if !delay.is_zero() {
                            tracing::debug!(target: "snmp_alarm::client", { delay_ms = delay.as_millis() as u64 }, "backing off");
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                Err(e) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    return Err(e);
                }
            }
        }

        let elapsed = start.elapsed();
        Span::current().record("snmp.elapsed_ms", elapsed.as_millis() as u64);
        tracing::debug!(target: "snmp_alarm::client", { snmp.target = %target.addr, ?elapsed, retries = max_attempts }, "request timed out");
        Err(Error::Timeout {
            target: target.addr,
            elapsed,
            retries: max_attempts,
        }
        .boxed())
    }

    /// Send a notification without waiting for any answer.
    ///
    /// SNMPv2 notifications have no SNMPv1 encoding, so a target tagged
    /// [`Version::V1`] is a configuration error.
    #[instrument(level = "debug", skip(self, target, pdu), err, fields(snmp.target = %target.addr))]
    pub async fn notify(&self, target: &Target, pdu: Pdu) -> Result<()> {
        if target.version == Version::V1 {
            return Err(Error::Config("SNMPv1 targets cannot carry SNMPv2 notifications".into()).boxed());
        }
        if pdu.kind() != PduKind::Trap {
            return Err(Error::Config(format!("notify expects a trap, got {}", pdu.kind()).into()).boxed());
        }

        let data = CommunityMessage::new(target.version, target.community.clone(), pdu).encode();
        tracing::trace!(target: "snmp_alarm::client", { snmp.bytes = data.len() }, "sending notification");
        self.inner.transport.send(data, target.addr).await
    }
}

impl Default for Client<UdpTransport> {
    fn default() -> Self {
        Self::udp()
    }
}

/// Check a GET response against the request that produced it and pull out
/// its single binding.
fn validate_response(target: &Target, request_id: i32, data: Bytes) -> Result<VarBind> {
    let malformed = || Error::MalformedPdu { target: target.addr }.boxed();
    let response = CommunityMessage::decode_with_target(data, target.addr)?;

    if response.version != target.version {
        tracing::warn!(target: "snmp_alarm::client", { expected = %target.version, actual = %response.version, peer = %target.addr }, "version mismatch in response");
        return Err(malformed());
    }

    let pdu = response.into_pdu();
    if pdu.kind() != PduKind::GetResponse {
        tracing::warn!(target: "snmp_alarm::client", { kind = %pdu.kind(), peer = %target.addr }, "unexpected PDU kind in response");
        return Err(malformed());
    }
    if pdu.request_id() != request_id {
        tracing::warn!(target: "snmp_alarm::client", { expected_request_id = request_id, actual_request_id = pdu.request_id(), peer = %target.addr }, "request ID mismatch in response");
        return Err(malformed());
    }

    let status = pdu.error_status();
    if status != ErrorStatus::NoError {
        return Err(Error::Rejected {
            target: target.addr,
            status,
            index: pdu.error_index().max(0) as u32,
        }
        .boxed());
    }

    pdu.into_varbinds().into_iter().next().ok_or_else(malformed)
}
