//! End-to-end trap correlation over localhost UDP.
//!
//! Run with: cargo test --features testing --test correlation

mod common;

use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use snmp_alarm::sink::{ChannelEventSink, MemoryRecordSink, Record, RecordSink};
use snmp_alarm::testing::{MockReply, MockTransport};
use snmp_alarm::{
    AlarmRecord, CommunityMessage, Error, Manager, Pdu, QueryOutcome, QueryRecord, VarBind,
    format_address, oids,
};

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn trap_is_recorded_then_answered() {
    let records = Arc::new(MemoryRecordSink::new());
    let mut manager = start_manager(Duration::from_secs(1), 2, records.clone()).await;
    let agent = TestAgent::start("AGENT_ID", manager.addr()).await;

    assert!(agent.agent.send_trap().await);
    assert!(wait_for_records(&records, 2).await, "no correlation");

    let all = records.records();
    let Record::Alarm(alarm) = &all[0] else {
        panic!("first record should be the alarm: {all:?}");
    };
    assert_eq!(alarm.agent_id, "AGENT_ID");
    assert_eq!(alarm.agent_address, format_address(&agent.addr()));
    assert_eq!(alarm.alarm_code, "666");
    assert_eq!(alarm.alarm_text, "Elevator jammed!");

    let Record::Query(query) = &all[1] else {
        panic!("second record should be the query: {all:?}");
    };
    assert_eq!(query.agent_id, "AGENT_ID");
    assert_eq!(
        query.outcome,
        QueryOutcome::Value("AGENT_ID says Hello.".into())
    );

    let trap = manager.events.recv().await.unwrap();
    assert!(
        trap.ends_with(&format!(
            "TRAP from agent AGENT_ID({}) 666:Elevator jammed!",
            format_address(&agent.addr())
        )),
        "{trap}"
    );
    let answer = manager.events.recv().await.unwrap();
    assert!(
        answer.ends_with("GET response from agent AGENT_ID: AGENT_ID says Hello."),
        "{answer}"
    );

    agent.shutdown().await;
    manager.shutdown().await;
}

#[tokio::test]
async fn concurrent_agents_each_get_their_own_answer() {
    let records = Arc::new(MemoryRecordSink::new());
    let manager = start_manager(Duration::from_secs(1), 2, records.clone()).await;

    let mut agents = Vec::new();
    for i in 0..5 {
        agents.push(TestAgent::start(&format!("AGENT_{i}"), manager.addr()).await);
    }
    for agent in &agents {
        assert!(agent.agent.send_trap().await);
    }
    assert!(wait_for_records(&records, 10).await, "missing records");

    let all = records.records();
    for agent in &agents {
        let id = agent.agent.agent_id();
        let alarm_at = all
            .iter()
            .position(|r| matches!(r, Record::Alarm(a) if a.agent_id == id))
            .unwrap();
        let query_at = all
            .iter()
            .position(|r| matches!(r, Record::Query(q) if q.agent_id == id))
            .unwrap();
        assert!(alarm_at < query_at, "{id}: query recorded before alarm");

        let Record::Query(query) = &all[query_at] else {
            unreachable!()
        };
        assert_eq!(query.outcome, QueryOutcome::Value(format!("{id} says Hello.")));
    }

    for agent in agents {
        agent.shutdown().await;
    }
    manager.shutdown().await;
}

// ============================================================================
// Failure handling
// ============================================================================

/// Notes how many GETs the silent peer had seen when the alarm was stored.
struct OrderingSink {
    inner: MemoryRecordSink,
    gets: Arc<AtomicUsize>,
    gets_at_alarm: Mutex<Option<usize>>,
}

impl RecordSink for OrderingSink {
    fn append_alarm(&self, record: &AlarmRecord) -> io::Result<()> {
        *self.gets_at_alarm.lock().unwrap() = Some(self.gets.load(Ordering::SeqCst));
        self.inner.append_alarm(record)
    }

    fn append_query(&self, record: &QueryRecord) -> io::Result<()> {
        self.inner.append_query(record)
    }
}

#[tokio::test]
async fn alarm_persists_before_get_and_silence_is_recorded() {
    let peer = SilentPeer::start().await;
    let records = Arc::new(OrderingSink {
        inner: MemoryRecordSink::new(),
        gets: peer.counter(),
        gets_at_alarm: Mutex::new(None),
    });
    let manager = start_manager(Duration::from_millis(100), 2, records.clone()).await;

    let trap = alarm_trap("AGENT_ID", &format_address(&peer.addr()));
    send_raw(&encode(trap), manager.addr()).await;

    assert!(wait_for_records(&records.inner, 2).await, "no failure recorded");
    assert_eq!(*records.gets_at_alarm.lock().unwrap(), Some(0));

    let query = &records.inner.queries()[0];
    assert_eq!(query.agent_id, "AGENT_ID");
    assert!(!query.outcome.is_ok());
    // initial attempt plus two retries
    assert_eq!(peer.received(), 3);

    manager.shutdown().await;
}

#[tokio::test]
async fn malformed_input_is_dropped_and_listening_continues() {
    let records = Arc::new(MemoryRecordSink::new());
    let manager = start_manager(Duration::from_millis(200), 0, records.clone()).await;
    let peer = SilentPeer::start().await;
    let address = format_address(&peer.addr());

    send_raw(b"\x30\x03garbage", manager.addr()).await;
    send_raw(&[], manager.addr()).await;

    let missing_address = Pdu::notification(
        2,
        5000,
        oids::alarm_notification(),
        [
            VarBind::new(oids::alarm_code(), "666"),
            VarBind::new(oids::agent_id(), "AGENT_ID"),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
        ],
    );
    send_raw(&encode(missing_address), manager.addr()).await;

    let wrong_type = Pdu::notification(
        3,
        5000,
        oids::alarm_notification(),
        [
            VarBind::new(oids::alarm_code(), 666),
            VarBind::new(oids::agent_id(), "AGENT_ID"),
            VarBind::new(oids::alarm_text(), "Elevator jammed!"),
            VarBind::new(oids::agent_address(), address.as_str()),
        ],
    );
    send_raw(&encode(wrong_type), manager.addr()).await;

    let cold_start = Pdu::notification(4, 5000, oids::cold_start(), Vec::new());
    send_raw(&encode(cold_start), manager.addr()).await;

    let foreign = CommunityMessage::v2c("private", alarm_trap("INTRUDER", &address)).encode();
    send_raw(&foreign, manager.addr()).await;

    send_raw(&encode(alarm_trap("AGENT_ID", &address)), manager.addr()).await;
    assert!(wait_for_records(&records, 2).await, "valid trap not handled");

    // give stragglers time to misbehave
    tokio::time::sleep(Duration::from_millis(100)).await;
    let alarms = records.alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].agent_id, "AGENT_ID");
    assert_eq!(records.len(), 2);

    manager.shutdown().await;
}

// ============================================================================
// Retry bound
// ============================================================================

#[tokio::test]
async fn retry_bound_caps_get_attempts() {
    let mock = MockTransport::new();
    let records = Arc::new(MemoryRecordSink::new());
    let (events, rx) = ChannelEventSink::new();
    let manager = Manager::builder()
        .bind("127.0.0.1:0")
        .timeout(Duration::from_millis(50))
        .retries(2)
        .records(records.clone())
        .events(Arc::new(events))
        .build_with_transport(mock.clone())
        .await
        .unwrap();
    let manager = TestManager::spawn(manager, rx);

    send_raw(&encode(alarm_trap("AGENT_ID", "127.0.0.1/1610")), manager.addr()).await;
    assert!(wait_for_records(&records, 2).await);

    assert_eq!(mock.request_count(), 3);
    for (target, _) in mock.requests() {
        assert_eq!(format_address(&target), "127.0.0.1/1610");
    }
    assert!(matches!(
        &records.queries()[0].outcome,
        QueryOutcome::Failed(reason) if reason.contains("timeout")
    ));

    manager.shutdown().await;
}

#[tokio::test]
async fn late_answer_within_retries_is_a_value() {
    let mock = MockTransport::new();
    mock.queue(MockReply::Timeout);
    mock.queue(MockReply::Value("AGENT_ID says Hello.".into()));

    let records = Arc::new(MemoryRecordSink::new());
    let manager = Manager::builder()
        .bind("127.0.0.1:0")
        .retries(2)
        .records(records.clone())
        .build_with_transport(mock.clone())
        .await
        .unwrap();
    let (_, rx) = ChannelEventSink::new();
    let manager = TestManager::spawn(manager, rx);

    send_raw(&encode(alarm_trap("AGENT_ID", "127.0.0.1/1610")), manager.addr()).await;
    assert!(wait_for_records(&records, 2).await);

    assert_eq!(mock.request_count(), 2);
    assert_eq!(
        records.queries()[0].outcome,
        QueryOutcome::Value("AGENT_ID says Hello.".into())
    );

    manager.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn stop_waits_for_in_flight_correlation() {
    let peer = SilentPeer::start().await;
    let records = Arc::new(MemoryRecordSink::new());
    let manager = start_manager(Duration::from_millis(200), 0, records.clone()).await;

    send_raw(
        &encode(alarm_trap("AGENT_ID", &format_address(&peer.addr()))),
        manager.addr(),
    )
    .await;
    let seen = &records;
    assert!(eventually(|| async move { !seen.alarms().is_empty() }).await);

    manager.shutdown().await;
    assert_eq!(records.queries().len(), 1);
}

#[tokio::test]
async fn port_is_exclusive_and_reusable_after_stop() {
    let records = Arc::new(MemoryRecordSink::new());
    let first = start_manager(Duration::from_secs(1), 0, records.clone()).await;
    let addr = first.addr();

    match Manager::builder().bind(format_address(&addr)).build().await {
        Err(err) => assert!(matches!(*err, Error::Bind { .. }), "{err}"),
        Ok(_) => panic!("second manager bound an occupied port"),
    }

    // one full correlation in the first lifetime
    let agent = TestAgent::start("AGENT_ID", addr).await;
    assert!(agent.agent.send_trap().await);
    assert!(wait_for_records(&records, 2).await);
    drop(first.shutdown().await);

    // nobody is listening, so this trap is lost
    send_raw(
        &encode(alarm_trap("WHILE_STOPPED", &format_address(&agent.addr()))),
        addr,
    )
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(records.len(), 2);

    let (events, rx) = ChannelEventSink::new();
    let second = Manager::builder()
        .bind(format_address(&addr))
        .records(records.clone())
        .events(Arc::new(events))
        .build()
        .await
        .expect("port should be free after stop");
    let second = TestManager::spawn(second, rx);
    assert_eq!(second.addr(), addr);

    assert!(agent.agent.send_trap().await);
    assert!(wait_for_records(&records, 4).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let all = records.records();
    assert_eq!(all.len(), 4, "{all:?}");
    assert!(matches!(
        all.as_slice(),
        [Record::Alarm(_), Record::Query(_), Record::Alarm(_), Record::Query(_)]
    ));
    let alarm_ids: Vec<_> = records.alarms().into_iter().map(|a| a.agent_id).collect();
    assert_eq!(alarm_ids, ["AGENT_ID", "AGENT_ID"]);
    assert!(records.queries().iter().all(|q| q.outcome.is_ok()));

    agent.shutdown().await;
    second.shutdown().await;
}

// ============================================================================
// Agent side
// ============================================================================

#[tokio::test]
async fn agent_trap_carries_alarm_fields() {
    let peer = SilentPeer::start().await;
    let agent = TestAgent::start("AGENT_ID", peer.addr()).await;

    let trap = agent.agent.build_trap("AGENT_ID", "127.0.0.1/1610");
    let fields = snmp_alarm::TrapFields::extract(&trap, peer.addr()).unwrap();
    assert_eq!(fields.agent_id, "AGENT_ID");
    assert_eq!(fields.agent_address, "127.0.0.1/1610");
    assert_eq!(fields.alarm_code, "666");
    assert_eq!(fields.alarm_text, "Elevator jammed!");

    assert!(agent.agent.send_trap().await);
    let seen = &peer;
    assert!(eventually(|| async move { seen.received() == 1 }).await);

    agent.shutdown().await;
}
