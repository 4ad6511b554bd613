//! Shared test infrastructure for snmp-alarm.
//!
//! In-process agents and managers on ephemeral localhost ports, a silent
//! peer for timeout scenarios, and polling helpers.

// Not every test file uses every helper
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use snmp_alarm::sink::{ChannelEventSink, MemoryRecordSink, RecordSink};
use snmp_alarm::transport::Transport;
use snmp_alarm::{
    Agent, CommunityMessage, DEFAULT_COMMUNITY, Manager, Pdu, Result, VarBind, format_address, oids,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// An agent serving GETs in a background task.
pub struct TestAgent {
    pub agent: Agent,
    task: JoinHandle<Result<()>>,
}

impl TestAgent {
    /// Start agent `id` on an ephemeral port, sending traps to `manager`.
    pub async fn start(id: &str, manager: SocketAddr) -> Self {
        let agent = Agent::builder(id)
            .bind("127.0.0.1:0")
            .manager(format_address(&manager))
            .build()
            .await
            .expect("failed to build test agent");
        let task = tokio::spawn({
            let agent = agent.clone();
            async move { agent.run().await }
        });
        Self { agent, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.agent.local_addr()
    }

    pub async fn shutdown(self) {
        self.agent.stop();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("agent did not stop")
            .expect("agent task panicked")
            .expect("agent run failed");
    }
}

/// A manager running in a background task with in-memory records and a
/// channel of event lines.
pub struct TestManager<T: Transport> {
    pub manager: Manager<T>,
    pub events: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<Result<()>>,
}

impl<T: Transport> TestManager<T> {
    pub fn spawn(manager: Manager<T>, events: mpsc::UnboundedReceiver<String>) -> Self {
        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.run().await }
        });
        Self {
            manager,
            events,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.manager.local_addr()
    }

    /// Stop and wait for `run` to return.
    pub async fn shutdown(self) -> Manager<T> {
        self.manager.stop();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("manager did not stop")
            .expect("manager task panicked")
            .expect("manager run failed");
        self.manager
    }
}

/// Build and start a UDP manager on an ephemeral port.
pub async fn start_manager(
    timeout: Duration,
    retries: u32,
    records: Arc<dyn RecordSink>,
) -> TestManager<snmp_alarm::UdpTransport> {
    let (events, rx) = ChannelEventSink::new();
    let manager = Manager::builder()
        .bind("127.0.0.1:0")
        .timeout(timeout)
        .retries(retries)
        .records(records)
        .events(Arc::new(events))
        .build()
        .await
        .expect("failed to build test manager");
    TestManager::spawn(manager, rx)
}

/// A UDP endpoint that counts datagrams and never answers.
pub struct SilentPeer {
    addr: SocketAddr,
    received: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SilentPeer {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind silent peer");
        let addr = socket.local_addr().expect("silent peer address");
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            while socket.recv_from(&mut buf).await.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        Self {
            addr,
            received,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.received.clone()
    }
}

impl Drop for SilentPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The alarm trap an agent named `id` at `address` would send.
pub fn alarm_trap(id: &str, address: &str) -> Pdu {
    Pdu::notification(
        1,
        5000,
        oids::alarm_notification(),
        [
            VarBind::new(oids::sys_descr(), "System Description"),
            VarBind::new(oids::alarm_code(), "666"),
            VarBind::new(oids::agent_id(), id),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
            VarBind::new(oids::agent_address(), address),
        ],
    )
}

/// Encode `pdu` with the default community.
pub fn encode(pdu: Pdu) -> Bytes {
    CommunityMessage::v2c(DEFAULT_COMMUNITY, pdu).encode()
}

/// Send raw bytes to `target` from a throwaway socket.
pub async fn send_raw(data: &[u8], target: SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
    socket.send_to(data, target).await.expect("send datagram");
}

/// Poll `check` until it holds or [`WAIT`] elapses.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until `records` holds at least `count` records.
pub async fn wait_for_records(records: &MemoryRecordSink, count: usize) -> bool {
    eventually(|| async move { records.len() >= count }).await
}
