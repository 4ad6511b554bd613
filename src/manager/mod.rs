//! Manager role: trap listener and correlator.
//!
//! For every alarm trap the manager
//!
//! 1. extracts alarm code, agent id, alarm text and agent address,
//! 2. appends an [`AlarmRecord`],
//! 3. GETs `sysDescr.0` from the agent address carried in the trap,
//! 4. appends a [`QueryRecord`] with the value or the failure.
//!
//! The GET goes to the address inside the trap payload, not to the
//! datagram's source. Anyone able to send a trap can direct that GET.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snmp_alarm::Manager;
//! use snmp_alarm::sink::FileRecordSink;
//!
//! # async fn example() -> snmp_alarm::Result<()> {
//! let records = FileRecordSink::in_dir(".").expect("log files");
//! let manager = Manager::builder()
//!     .bind("127.0.0.1/1620")
//!     .records(Arc::new(records))
//!     .build()
//!     .await?;
//!
//! manager.run().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::agent::DEFAULT_MANAGER_ADDRESS;
use crate::client::{Client, DEFAULT_TIMEOUT, Retry, Target};
use crate::error::{Error, Result, TrapDefect};
use crate::message::DEFAULT_COMMUNITY;
use crate::oid::Oid;
use crate::oids;
use crate::pdu::{Pdu, PduKind};
use crate::sink::{
    AlarmRecord, EventSink, MemoryRecordSink, QueryRecord, RecordSink, TracingEventSink,
    get_response_line, trap_line,
};
use crate::transport::{Inbound, Listener, Transport, UdpTransport};
use crate::util::{community_matches, parse_address};
use crate::value::Value;

/// Default cap on correlations running at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 1000;

/// Builder for [`Manager`].
pub struct ManagerBuilder {
    bind_addr: String,
    community: Bytes,
    timeout: Duration,
    retry: Retry,
    max_concurrent: Option<usize>,
    records: Arc<dyn RecordSink>,
    events: Arc<dyn EventSink>,
    cancel: Option<CancellationToken>,
}

impl ManagerBuilder {
    /// Create a builder with default settings.
    ///
    /// Defaults:
    /// - Bind address: `127.0.0.1/1620`
    /// - Community: `"public"`
    /// - GET timeout: 10 seconds, 2 retries
    /// - Max concurrent correlations: 1000
    /// - Records: kept in memory
    /// - Events: logged through `tracing`
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_MANAGER_ADDRESS.to_string(),
            community: Bytes::from_static(DEFAULT_COMMUNITY),
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
            max_concurrent: Some(DEFAULT_MAX_CONCURRENT),
            records: Arc::new(MemoryRecordSink::new()),
            events: Arc::new(TracingEventSink),
            cancel: None,
        }
    }

    /// Address to listen for traps on (`host:port` or `host/port`).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Community required on traps and sent with GETs.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Per-attempt GET timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of GET retries after a timeout.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retry = Retry::immediate(retries);
        self
    }

    /// Full retry policy for GETs.
    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Cap on concurrently running correlations (`None` = unbounded).
    pub fn max_concurrent(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent = limit;
        self
    }

    /// Where alarm and GET records are appended.
    pub fn records(mut self, records: Arc<dyn RecordSink>) -> Self {
        self.records = records;
        self
    }

    /// Where display lines go.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Stop [`Manager::run`] when `token` is cancelled.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bind the trap listener and build a manager querying over UDP.
    pub async fn build(self) -> Result<Manager> {
        self.build_with_transport(UdpTransport::new()).await
    }

    /// Build a manager whose GETs go through `transport`.
    pub async fn build_with_transport<T: Transport>(
        mut self,
        transport: T,
    ) -> Result<Manager<T>> {
        if self.max_concurrent == Some(0) {
            return Err(Error::Config("max_concurrent must be at least 1".into()).boxed());
        }

        let mut listener = Listener::bind(&self.bind_addr).await?;
        if let Some(token) = self.cancel.take() {
            listener = listener.with_cancel(token);
        }

        tracing::info!(target: "snmp_alarm::manager", { snmp.local_addr = %listener.local_addr() }, "manager bound");

        Ok(Manager {
            inner: Arc::new(ManagerInner {
                listener,
                limit: self.max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
                querier: self.querier_with_transport(transport),
            }),
        })
    }

    /// Build only the GET side, over UDP. The trap port is not bound.
    pub fn querier(self) -> Querier {
        self.querier_with_transport(UdpTransport::new())
    }

    /// Build only the GET side, sending through `transport`.
    pub fn querier_with_transport<T: Transport>(self, transport: T) -> Querier<T> {
        Querier {
            client: Client::new(transport),
            community: self.community,
            timeout: self.timeout,
            retry: self.retry,
            records: self.records,
            events: self.events,
        }
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The four application fields of an alarm trap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapFields {
    pub alarm_code: String,
    pub agent_id: String,
    pub alarm_text: String,
    pub agent_address: String,
}

impl TrapFields {
    /// Pull the alarm fields out of a trap received from `peer`.
    ///
    /// Fails with [`Error::MalformedTrap`] when the trap announces some
    /// other notification or a field is absent, not an octet string, or
    /// not UTF-8.
    pub fn extract(pdu: &Pdu, peer: SocketAddr) -> Result<Self> {
        let malformed = |defect| Error::MalformedTrap { peer, defect }.boxed();

        match pdu.notification_oid() {
            Some(oid) if *oid == oids::alarm_notification() => {}
            Some(oid) => return Err(malformed(TrapDefect::UnknownNotification(oid.clone()))),
            None => return Err(malformed(TrapDefect::Missing(oids::snmp_trap_oid()))),
        }

        let text = |oid: Oid| -> Result<String> {
            match pdu.binding(&oid) {
                None => Err(malformed(TrapDefect::Missing(oid))),
                Some(Value::OctetString(bytes)) => match std::str::from_utf8(bytes) {
                    Ok(text) => Ok(text.to_owned()),
                    Err(_) => Err(malformed(TrapDefect::NotUtf8(oid))),
                },
                Some(_) => Err(malformed(TrapDefect::WrongType(oid))),
            }
        };

        Ok(Self {
            alarm_code: text(oids::alarm_code())?,
            agent_id: text(oids::agent_id())?,
            alarm_text: text(oids::alarm_text())?,
            agent_address: text(oids::agent_address())?,
        })
    }
}

/// What one trap produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationReport {
    pub alarm: AlarmRecord,
    pub query: QueryRecord,
}

/// Trap listener and correlator.
///
/// Cheap to clone; clones share the socket, sinks and stop signal.
pub struct Manager<T: Transport = UdpTransport> {
    inner: Arc<ManagerInner<T>>,
}

impl<T: Transport> Clone for Manager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ManagerInner<T: Transport> {
    listener: Listener,
    limit: Option<Arc<Semaphore>>,
    querier: Querier<T>,
}

impl Manager<UdpTransport> {
    /// Create a builder.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }
}

impl<T: Transport> Manager<T> {
    /// The address traps are received on.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.listener.local_addr()
    }

    /// Stop [`run`](Self::run). Correlations already started complete.
    pub fn stop(&self) {
        self.inner.listener.stop();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.listener.is_stopped()
    }

    /// Listen for traps until stopped.
    ///
    /// Each accepted trap is correlated in its own task. Once stopped,
    /// `run` waits for those tasks before returning.
    pub async fn run(&self) -> Result<()> {
        let tasks = TaskTracker::new();
        tracing::info!(target: "snmp_alarm::manager", { snmp.local_addr = %self.local_addr() }, "manager listening");

        while let Some(inbound) = self.inner.listener.recv().await {
            let permit = match &self.inner.limit {
                Some(limit) => match Arc::clone(limit).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
                None => None,
            };

            let manager = self.clone();
            tasks.spawn(async move {
                manager.handle(inbound).await;
                drop(permit);
            });
        }

        tasks.close();
        if !tasks.is_empty() {
            tracing::debug!(target: "snmp_alarm::manager", { in_flight = tasks.len() }, "waiting for correlations");
        }
        tasks.wait().await;
        tracing::info!(target: "snmp_alarm::manager", "manager stopped");
        Ok(())
    }

    async fn handle(&self, inbound: Inbound) {
        let Inbound { message, source } = inbound;

        if !community_matches(&self.inner.querier.community, &message.community) {
            tracing::debug!(target: "snmp_alarm::manager", { snmp.source = %source }, "dropping message with unknown community");
            return;
        }
        if message.pdu.kind() != PduKind::Trap {
            tracing::debug!(target: "snmp_alarm::manager", { snmp.source = %source, kind = %message.pdu.kind() }, "ignoring non-trap PDU");
            return;
        }

        match self.correlate(&message.pdu, source).await {
            Ok(report) => {
                tracing::debug!(target: "snmp_alarm::manager", { agent_id = %report.alarm.agent_id, ok = report.query.outcome.is_ok() }, "trap correlated");
            }
            Err(e) => match &*e {
                Error::MalformedTrap {
                    defect: TrapDefect::UnknownNotification(oid),
                    ..
                } => {
                    tracing::info!(target: "snmp_alarm::manager", { snmp.source = %source, notification = %oid }, "ignoring notification");
                }
                _ => {
                    tracing::warn!(target: "snmp_alarm::manager", { snmp.source = %source, error = %e }, "dropping malformed trap");
                }
            },
        }
    }

    /// Run the full cycle for one trap.
    ///
    /// The alarm is persisted before any GET is sent. GET failures do not
    /// fail the correlation; they are recorded. Only a trap that cannot
    /// be read as an alarm is an error, and then nothing is persisted.
    pub async fn correlate(&self, pdu: &Pdu, source: SocketAddr) -> Result<CorrelationReport> {
        let fields = TrapFields::extract(pdu, source)?;

        let alarm = AlarmRecord::new(
            fields.agent_id.as_str(),
            fields.agent_address.as_str(),
            fields.alarm_code.as_str(),
            fields.alarm_text.as_str(),
        );
        tracing::info!(target: "snmp_alarm::manager", { agent_id = %alarm.agent_id, agent_address = %alarm.agent_address, alarm_code = %alarm.alarm_code, snmp.source = %source }, "alarm received");
        let querier = &self.inner.querier;
        let record = alarm.clone();
        if let Err(e) = querier.persist(move |sink| sink.append_alarm(&record)).await {
            tracing::error!(target: "snmp_alarm::manager", { agent_id = %alarm.agent_id, error = %e }, "failed to persist alarm");
        }
        querier.events.notify(&trap_line(&alarm));

        let query = querier.query(&fields.agent_address, &fields.agent_id).await;
        Ok(CorrelationReport { alarm, query })
    }

    /// GET `sysDescr.0` from `address` on behalf of `agent_id` and persist
    /// the outcome.
    pub async fn query(&self, address: &str, agent_id: &str) -> QueryRecord {
        self.inner.querier.query(address, agent_id).await
    }
}

/// The GET half of a manager: asks an agent for `sysDescr.0` and records
/// the answer.
///
/// Every [`Manager`] owns one. [`ManagerBuilder::querier`] builds one on
/// its own for a one-off query while another process holds the trap port.
pub struct Querier<T: Transport = UdpTransport> {
    client: Client<T>,
    community: Bytes,
    timeout: Duration,
    retry: Retry,
    records: Arc<dyn RecordSink>,
    events: Arc<dyn EventSink>,
}

impl<T: Transport> Querier<T> {

    /// GET `sysDescr.0` from `address` on behalf of `agent_id` and persist
    /// the outcome.
    pub async fn query(&self, address: &str, agent_id: &str) -> QueryRecord {
        let record = match parse_address(address) {
            Ok(addr) => {
                let target = Target::new(addr)
                    .with_community(self.community.clone())
                    .with_timeout(self.timeout)
                    .with_retry(self.retry.clone());
                self.get_description(&target, agent_id).await
            }
            Err(e) => {
                tracing::warn!(target: "snmp_alarm::manager", { agent_id, error = %e }, "agent address unusable");
                QueryRecord::failed(agent_id, e.to_string())
            }
        };

        let stored = record.clone();
        if let Err(e) = self.persist(move |sink| sink.append_query(&stored)).await {
            tracing::error!(target: "snmp_alarm::manager", { agent_id, error = %e }, "failed to persist GET result");
        }
        self.events.notify(&get_response_line(&record));
        record
    }

    /// Append through the record sink on the blocking pool. File sinks
    /// write and flush synchronously.
    async fn persist<F>(&self, append: F) -> io::Result<()>
    where
        F: FnOnce(&dyn RecordSink) -> io::Result<()> + Send + 'static,
    {
        let records = Arc::clone(&self.records);
        match tokio::task::spawn_blocking(move || append(records.as_ref())).await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        }
    }

    async fn get_description(&self, target: &Target, agent_id: &str) -> QueryRecord {
        match self.client.get(target, &oids::sys_descr()).await {
            Ok(vb) if vb.value.is_exception() => {
                tracing::warn!(target: "snmp_alarm::manager", { agent_id, snmp.target = %target.addr, value = %vb.value }, "agent has no description");
                QueryRecord::failed(agent_id, vb.value.to_string())
            }
            Ok(vb) => {
                tracing::info!(target: "snmp_alarm::manager", { agent_id, snmp.target = %target.addr }, "GET response");
                QueryRecord::value(agent_id, vb.value.to_string())
            }
            Err(e) => {
                tracing::warn!(target: "snmp_alarm::manager", { agent_id, snmp.target = %target.addr, error = %e }, "GET failed");
                QueryRecord::failed(agent_id, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{QueryOutcome, Record};
    use crate::transport::{MockReply, MockTransport};
    use crate::varbind::VarBind;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn alarm_trap(fields: Vec<VarBind>) -> Pdu {
        let mut varbinds = vec![VarBind::new(oids::sys_descr(), "System Description")];
        varbinds.extend(fields);
        Pdu::notification(1, 5000, oids::alarm_notification(), varbinds)
    }

    fn full_trap(address: &str) -> Pdu {
        alarm_trap(vec![
            VarBind::new(oids::alarm_code(), "666"),
            VarBind::new(oids::agent_id(), "AGENT_ID"),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
            VarBind::new(oids::agent_address(), address),
        ])
    }

    async fn manager(mock: MockTransport) -> (Manager<MockTransport>, Arc<MemoryRecordSink>) {
        let records = Arc::new(MemoryRecordSink::new());
        let manager = Manager::builder()
            .bind("127.0.0.1:0")
            .timeout(Duration::from_millis(10))
            .retries(2)
            .records(records.clone())
            .build_with_transport(mock)
            .await
            .unwrap();
        (manager, records)
    }

    #[test]
    fn extract_fields() {
        let fields = TrapFields::extract(&full_trap("127.0.0.1/1610"), peer()).unwrap();
        assert_eq!(
            fields,
            TrapFields {
                alarm_code: "666".into(),
                agent_id: "AGENT_ID".into(),
                alarm_text: "Elevator jammed!".into(),
                agent_address: "127.0.0.1/1610".into(),
            }
        );
    }

    #[test]
    fn extract_reports_each_defect() {
        let missing = alarm_trap(vec![
            VarBind::new(oids::alarm_code(), "666"),
            VarBind::new(oids::agent_id(), "AGENT_ID"),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
        ]);
        let err = TrapFields::extract(&missing, peer()).unwrap_err();
        assert!(matches!(&*err, Error::MalformedTrap { defect: TrapDefect::Missing(oid), .. } if *oid == oids::agent_address()));

        let wrong_type = alarm_trap(vec![
            VarBind::new(oids::alarm_code(), Value::Integer(666)),
            VarBind::new(oids::agent_id(), "AGENT_ID"),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
            VarBind::new(oids::agent_address(), "127.0.0.1/1610"),
        ]);
        let err = TrapFields::extract(&wrong_type, peer()).unwrap_err();
        assert!(matches!(&*err, Error::MalformedTrap { defect: TrapDefect::WrongType(oid), .. } if *oid == oids::alarm_code()));

        let binary = alarm_trap(vec![
            VarBind::new(oids::alarm_code(), "666"),
            VarBind::new(oids::agent_id(), Bytes::from_static(&[0xff, 0xfe])),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
            VarBind::new(oids::agent_address(), "127.0.0.1/1610"),
        ]);
        let err = TrapFields::extract(&binary, peer()).unwrap_err();
        assert!(matches!(&*err, Error::MalformedTrap { defect: TrapDefect::NotUtf8(_), .. }));

        let cold = Pdu::notification(1, 0, oids::cold_start(), []);
        let err = TrapFields::extract(&cold, peer()).unwrap_err();
        assert!(matches!(&*err, Error::MalformedTrap { defect: TrapDefect::UnknownNotification(_), .. }));
    }

    #[test]
    fn parent_oid_does_not_satisfy_field() {
        let trap = alarm_trap(vec![
            VarBind::new(oids::alarm_notification(), "666"),
            VarBind::new(oids::agent_id(), "AGENT_ID"),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
            VarBind::new(oids::agent_address(), "127.0.0.1/1610"),
        ]);
        assert!(TrapFields::extract(&trap, peer()).is_err());
    }

    #[tokio::test]
    async fn correlate_persists_alarm_then_value() {
        let mock = MockTransport::new();
        mock.queue(MockReply::Value("AGENT_ID says Hello.".into()));
        let (manager, records) = manager(mock.clone()).await;

        let report = manager.correlate(&full_trap("127.0.0.1/1610"), peer()).await.unwrap();
        assert_eq!(report.query.outcome, QueryOutcome::Value("AGENT_ID says Hello.".into()));

        let stored = records.records();
        assert_eq!(stored, vec![Record::Alarm(report.alarm), Record::Query(report.query)]);

        let (target, request) = &mock.requests()[0];
        assert_eq!(*target, "127.0.0.1:1610".parse().unwrap());
        assert_eq!(request.pdu.varbinds()[0].oid, oids::sys_descr());
    }

    #[tokio::test]
    async fn silent_agent_records_failure_after_all_attempts() {
        let mock = MockTransport::new();
        let (manager, records) = manager(mock.clone()).await;

        let report = manager.correlate(&full_trap("127.0.0.1/1610"), peer()).await.unwrap();
        assert!(matches!(report.query.outcome, QueryOutcome::Failed(_)));
        assert_eq!(mock.request_count(), 3);
        assert_eq!(records.alarms().len(), 1);
        assert_eq!(records.queries().len(), 1);
    }

    #[tokio::test]
    async fn unusable_address_still_persists_alarm() {
        let mock = MockTransport::new();
        let (manager, records) = manager(mock.clone()).await;

        let report = manager.correlate(&full_trap("no port here"), peer()).await.unwrap();
        assert!(!report.query.outcome.is_ok());
        assert_eq!(mock.request_count(), 0);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn no_such_object_is_a_failure() {
        let mock = MockTransport::new();
        mock.queue(MockReply::Value(Value::NoSuchObject));
        let (manager, _) = manager(mock).await;

        let record = manager.query("127.0.0.1/1610", "AGENT_ID").await;
        assert!(!record.outcome.is_ok());
    }

    #[tokio::test]
    async fn malformed_trap_persists_nothing() {
        let (manager, records) = manager(MockTransport::new()).await;
        let trap = alarm_trap(vec![VarBind::new(oids::agent_id(), "AGENT_ID")]);

        assert!(manager.correlate(&trap, peer()).await.is_err());
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn querier_leaves_trap_port_free() {
        let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap().to_string();

        let mock = MockTransport::new();
        mock.queue(MockReply::Value("AGENT_ID says Hello.".into()));
        let records = Arc::new(MemoryRecordSink::new());
        let querier = Manager::builder()
            .bind(addr.as_str())
            .records(records.clone())
            .querier_with_transport(mock.clone());

        let record = querier.query("127.0.0.1/1610", "AGENT_ID").await;
        assert_eq!(record.outcome, QueryOutcome::Value("AGENT_ID says Hello.".into()));
        assert_eq!(records.records(), vec![Record::Query(record)]);
        assert_eq!(mock.request_count(), 1);
    }

    #[derive(Default)]
    struct SlowSink {
        inner: MemoryRecordSink,
    }

    impl RecordSink for SlowSink {
        fn append_alarm(&self, record: &AlarmRecord) -> io::Result<()> {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.append_alarm(record)
        }

        fn append_query(&self, record: &QueryRecord) -> io::Result<()> {
            self.inner.append_query(record)
        }
    }

    #[tokio::test]
    async fn slow_records_do_not_stall_the_runtime() {
        let mock = MockTransport::new();
        mock.queue(MockReply::Value("AGENT_ID says Hello.".into()));
        let records = Arc::new(SlowSink::default());
        let manager = Manager::builder()
            .bind("127.0.0.1:0")
            .records(records.clone())
            .build_with_transport(mock)
            .await
            .unwrap();

        let correlation = tokio::spawn({
            let manager = manager.clone();
            async move { manager.correlate(&full_trap("127.0.0.1/1610"), peer()).await }
        });

        // single-threaded runtime: this timer only fires if the append yields
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(250), "{:?}", started.elapsed());

        let report = correlation.await.unwrap().unwrap();
        assert!(report.query.outcome.is_ok());
        assert_eq!(records.inner.len(), 2);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let err = Manager::builder()
            .bind("127.0.0.1:0")
            .max_concurrent(Some(0))
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(*err, Error::Config(_)));
    }
}
