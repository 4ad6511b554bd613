//! Agent role.
//!
//! An [`Agent`] sends alarm traps to its manager and answers GETs for
//! `sysDescr.0` on its own listening address.
//!
//! # Example
//!
//! ```rust,no_run
//! use snmp_alarm::Agent;
//!
//! # async fn example() -> snmp_alarm::Result<()> {
//! let agent = Agent::builder("AGENT_ID")
//!     .bind("127.0.0.1/1610")
//!     .manager("127.0.0.1/1620")
//!     .build()
//!     .await?;
//!
//! let serving = tokio::spawn({
//!     let agent = agent.clone();
//!     async move { agent.run().await }
//! });
//!
//! agent.send_trap().await;
//! agent.stop();
//! serving.await.ok();
//! # Ok(())
//! # }
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::{Client, Target, next_request_id};
use crate::error::{Error, ErrorStatus, Result};
use crate::message::{CommunityMessage, DEFAULT_COMMUNITY};
use crate::oid::Oid;
use crate::oids;
use crate::pdu::{Pdu, PduKind};
use crate::sink::{EventSink, TracingEventSink, format_timestamp, now, trap_sent_line};
use crate::transport::{Inbound, Listener, Transport, UdpTransport};
use crate::util::{community_matches, format_address, parse_address};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Default listening address for GETs.
pub const DEFAULT_AGENT_ADDRESS: &str = "127.0.0.1/1610";
/// Default manager address traps are sent to.
pub const DEFAULT_MANAGER_ADDRESS: &str = "127.0.0.1/1620";
/// Default alarm code carried in traps.
pub const DEFAULT_ALARM_CODE: &str = "666";
/// Default alarm text carried in traps.
pub const DEFAULT_ALARM_TEXT: &str = "Elevator jammed!";

/// `sysDescr.0` value carried inside every alarm trap.
const TRAP_SYS_DESCR: &str = "System Description";

/// Request id of a trap from [`Agent::build_trap`].
pub const TEMPLATE_REQUEST_ID: i32 = 0;
/// `sysUpTime.0` of a trap from [`Agent::build_trap`], in hundredths of a
/// second.
pub const TEMPLATE_UPTIME: u32 = 5000;

/// Builder for [`Agent`].
pub struct AgentBuilder {
    agent_id: String,
    bind_addr: String,
    manager: String,
    advertised: Option<String>,
    description: Option<String>,
    alarm_code: String,
    alarm_text: String,
    community: Bytes,
    version: Version,
    events: Arc<dyn EventSink>,
    cancel: Option<CancellationToken>,
}

impl AgentBuilder {
    /// Create a builder for the agent named `agent_id`.
    ///
    /// Defaults:
    /// - Bind address: `127.0.0.1/1610`
    /// - Manager: `127.0.0.1/1620`, SNMPv2c, community `"public"`
    /// - Description: `"<agent_id> says Hello."`
    /// - Alarm: code `"666"`, text `"Elevator jammed!"`
    /// - Events: logged through `tracing`
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            bind_addr: DEFAULT_AGENT_ADDRESS.to_string(),
            manager: DEFAULT_MANAGER_ADDRESS.to_string(),
            advertised: None,
            description: None,
            alarm_code: DEFAULT_ALARM_CODE.to_string(),
            alarm_text: DEFAULT_ALARM_TEXT.to_string(),
            community: Bytes::from_static(DEFAULT_COMMUNITY),
            version: Version::V2c,
            events: Arc::new(TracingEventSink),
            cancel: None,
        }
    }

    /// Address to listen for GETs on (`host:port` or `host/port`).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Manager address traps are sent to.
    pub fn manager(mut self, addr: impl Into<String>) -> Self {
        self.manager = addr.into();
        self
    }

    /// Address written into traps for the manager to query back.
    ///
    /// Defaults to the bound address, with an unspecified IP replaced by
    /// loopback.
    pub fn advertise(mut self, addr: impl Into<String>) -> Self {
        self.advertised = Some(addr.into());
        self
    }

    /// Value answered for `sysDescr.0`.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Alarm code carried in traps.
    pub fn alarm_code(mut self, code: impl Into<String>) -> Self {
        self.alarm_code = code.into();
        self
    }

    /// Alarm text carried in traps.
    pub fn alarm_text(mut self, text: impl Into<String>) -> Self {
        self.alarm_text = text.into();
        self
    }

    /// Community used for traps and required on incoming GETs.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Protocol version tag for traps. SNMPv1 is rejected by
    /// [`build`](Self::build).
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Where "a trap sent" lines go.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Stop [`Agent::run`] when `token` is cancelled.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bind the listening socket and build an agent sending over UDP.
    pub async fn build(self) -> Result<Agent> {
        self.build_with_transport(UdpTransport::new()).await
    }

    /// Build an agent whose traps go through `transport`.
    pub async fn build_with_transport<T: Transport>(self, transport: T) -> Result<Agent<T>> {
        if self.version == Version::V1 {
            return Err(Error::Config("SNMPv1 agents cannot send SNMPv2 traps".into()).boxed());
        }
        if self.agent_id.is_empty() {
            return Err(Error::Config("agent id must not be empty".into()).boxed());
        }

        let manager = Target::new(parse_address(&self.manager)?)
            .with_community(self.community.clone())
            .with_version(self.version);

        let mut listener = Listener::bind(&self.bind_addr).await?;
        if let Some(token) = self.cancel {
            listener = listener.with_cancel(token);
        }
        let local_addr = listener.local_addr();

        let advertised = self
            .advertised
            .unwrap_or_else(|| format_address(&reachable(local_addr)));
        let description = self
            .description
            .unwrap_or_else(|| format!("{} says Hello.", self.agent_id));

        tracing::info!(target: "snmp_alarm::agent", { agent_id = %self.agent_id, snmp.local_addr = %local_addr, snmp.manager = %manager.addr }, "agent bound");

        Ok(Agent {
            inner: Arc::new(AgentInner {
                agent_id: self.agent_id,
                advertised,
                description,
                alarm_code: self.alarm_code,
                alarm_text: self.alarm_text,
                community: self.community,
                manager,
                listener,
                client: Client::new(transport),
                events: self.events,
                started: Instant::now(),
            }),
        })
    }
}

/// Replace an unspecified bind IP with loopback of the same family.
fn reachable(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port()),
        _ => addr,
    }
}

/// An alarm-raising agent.
///
/// Cheap to clone; clones share the socket and configuration.
pub struct Agent<T: Transport = UdpTransport> {
    inner: Arc<AgentInner<T>>,
}

impl<T: Transport> Clone for Agent<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AgentInner<T: Transport> {
    agent_id: String,
    advertised: String,
    description: String,
    alarm_code: String,
    alarm_text: String,
    community: Bytes,
    manager: Target,
    listener: Listener,
    client: Client<T>,
    events: Arc<dyn EventSink>,
    started: Instant,
}

impl Agent<UdpTransport> {
    /// Create a builder for the agent named `agent_id`.
    pub fn builder(agent_id: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(agent_id)
    }
}

impl<T: Transport> Agent<T> {
    /// This agent's id.
    pub fn agent_id(&self) -> &str {
        &self.inner.agent_id
    }

    /// The address GETs are served on.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.listener.local_addr()
    }

    /// The `host/port` written into traps.
    pub fn advertised_address(&self) -> &str {
        &self.inner.advertised
    }

    /// The value answered for `sysDescr.0`.
    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Where traps are sent.
    pub fn manager(&self) -> &Target {
        &self.inner.manager
    }

    /// Time since the agent was built, in hundredths of a second.
    fn uptime(&self) -> u32 {
        let centis = self.inner.started.elapsed().as_millis() / 10;
        u32::try_from(centis).unwrap_or(u32::MAX)
    }

    /// Build the alarm trap for `agent_id` reachable at `agent_address`.
    ///
    /// Bindings in order: `sysUpTime.0`, `snmpTrapOID.0` = `1.2.3.4.5`,
    /// `sysDescr.0`, then alarm code, agent id, alarm text and agent
    /// address under `1.2.3.4.5`.
    ///
    /// The result depends on the arguments and configuration only: the
    /// request id is [`TEMPLATE_REQUEST_ID`] and the uptime
    /// [`TEMPLATE_UPTIME`]. [`send_trap`](Self::send_trap) sends the same
    /// bindings stamped with a fresh request id and the live uptime.
    pub fn build_trap(&self, agent_id: &str, agent_address: &str) -> Pdu {
        self.alarm_trap(TEMPLATE_REQUEST_ID, TEMPLATE_UPTIME, agent_id, agent_address)
    }

    fn alarm_trap(&self, request_id: i32, uptime: u32, agent_id: &str, agent_address: &str) -> Pdu {
        Pdu::notification(
            request_id,
            uptime,
            oids::alarm_notification(),
            [
                VarBind::new(oids::sys_descr(), TRAP_SYS_DESCR),
                VarBind::new(oids::alarm_code(), self.inner.alarm_code.as_str()),
                VarBind::new(oids::agent_id(), agent_id),
                VarBind::new(oids::alarm_text(), self.inner.alarm_text.as_str()),
                VarBind::new(oids::agent_address(), agent_address),
            ],
        )
    }

    /// Send this agent's alarm trap to the manager.
    ///
    /// Returns whether the trap left the host. Failures are logged and
    /// reported to the event sink, never raised.
    pub async fn send_trap(&self) -> bool {
        let trap = self.alarm_trap(
            next_request_id(),
            self.uptime(),
            &self.inner.agent_id,
            &self.inner.advertised,
        );
        self.deliver(trap, "alarm").await
    }

    /// Announce startup with a `coldStart` notification.
    pub async fn send_cold_start(&self) -> bool {
        let trap = Pdu::notification(next_request_id(), self.uptime(), oids::cold_start(), []);
        self.deliver(trap, "coldStart").await
    }

    async fn deliver(&self, trap: Pdu, what: &str) -> bool {
        let manager = &self.inner.manager;
        match self.inner.client.notify(manager, trap).await {
            Ok(()) => {
                tracing::debug!(target: "snmp_alarm::agent", { agent_id = %self.inner.agent_id, snmp.manager = %manager.addr, notification = what }, "trap sent");
                self.inner
                    .events
                    .notify(&trap_sent_line(&now(), &manager.addr));
                true
            }
            Err(e) => {
                tracing::warn!(target: "snmp_alarm::agent", { agent_id = %self.inner.agent_id, snmp.manager = %manager.addr, notification = what, error = %e }, "failed to send trap");
                self.inner.events.notify(&format!(
                    "{} failed to send a trap to {}: {}",
                    format_timestamp(&now()),
                    format_address(&manager.addr),
                    e
                ));
                false
            }
        }
    }

    /// Answer a GET.
    ///
    /// `sysDescr.0` resolves to the configured description; any other OID
    /// is answered with a `noSuchObject` binding. A PDU that is not a GET
    /// gets a `genErr` response.
    pub fn on_get(&self, request: &Pdu) -> Pdu {
        let requested = request
            .varbinds()
            .first()
            .map(|vb| vb.oid.clone())
            .unwrap_or_else(oids::sys_descr);

        if request.kind() != PduKind::Get {
            return Pdu::response(request.request_id(), VarBind::null(requested))
                .with_error(ErrorStatus::GenErr, 0);
        }

        let value = self.resolve(&requested);
        Pdu::response(request.request_id(), VarBind::new(requested, value))
    }

    fn resolve(&self, oid: &Oid) -> Value {
        if *oid == oids::sys_descr() {
            Value::from(self.inner.description.as_str())
        } else {
            Value::NoSuchObject
        }
    }

    /// Serve GETs until stopped.
    ///
    /// Requests with the wrong community, and anything that is not a GET,
    /// are dropped. Each request is answered in its own task; `run` returns
    /// once in-flight answers are sent.
    pub async fn run(&self) -> Result<()> {
        let tasks = TaskTracker::new();
        tracing::info!(target: "snmp_alarm::agent", { agent_id = %self.inner.agent_id, snmp.local_addr = %self.local_addr() }, "agent serving");

        while let Some(Inbound { message, source }) = self.inner.listener.recv().await {
            if !community_matches(&self.inner.community, &message.community) {
                tracing::debug!(target: "snmp_alarm::agent", { snmp.source = %source }, "dropping request with unknown community");
                continue;
            }
            if message.pdu.kind() != PduKind::Get {
                tracing::debug!(target: "snmp_alarm::agent", { snmp.source = %source, kind = %message.pdu.kind() }, "ignoring non-GET PDU");
                continue;
            }

            let agent = self.clone();
            tasks.spawn(async move {
                let response = agent.on_get(&message.pdu);
                let reply = CommunityMessage::new(message.version, message.community, response).encode();
                if let Err(e) = agent.inner.listener.send_to(&reply, source).await {
                    tracing::warn!(target: "snmp_alarm::agent", { snmp.source = %source, error = %e }, "failed to send response");
                }
            });
        }

        tasks.close();
        tasks.wait().await;
        tracing::info!(target: "snmp_alarm::agent", { agent_id = %self.inner.agent_id }, "agent stopped");
        Ok(())
    }

    /// Stop [`run`](Self::run).
    pub fn stop(&self) {
        self.inner.listener.stop();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.listener.is_stopped()
    }
}
