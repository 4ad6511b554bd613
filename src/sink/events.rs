//! Human-readable event lines.

use std::net::SocketAddr;

use chrono::NaiveDateTime;
use tokio::sync::mpsc;

use super::{AlarmRecord, QueryOutcome, QueryRecord, format_timestamp};
use crate::util::format_address;

/// Receives one formatted line per event.
///
/// Fire-and-forget: a sink that cannot deliver drops the line.
pub trait EventSink: Send + Sync + 'static {
    fn notify(&self, line: &str);
}

/// Emits each line as an `info` event on target `snmp_alarm::sink`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn notify(&self, line: &str) {
        tracing::info!(target: "snmp_alarm::sink", "{line}");
    }
}

/// Forwards lines to an unbounded channel, e.g. to a display task.
///
/// ```rust
/// use snmp_alarm::sink::{ChannelEventSink, EventSink};
///
/// let (sink, mut rx) = ChannelEventSink::new();
/// sink.notify("hello");
/// assert_eq!(rx.try_recv().unwrap(), "hello");
/// ```
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn notify(&self, line: &str) {
        if self.tx.send(line.to_owned()).is_err() {
            tracing::trace!(target: "snmp_alarm::sink", "event receiver dropped");
        }
    }
}

/// `<ts> TRAP from agent <id>(<addr>) <code>:<text>`
pub fn trap_line(record: &AlarmRecord) -> String {
    format!(
        "{} TRAP from agent {}({}) {}:{}",
        format_timestamp(&record.timestamp),
        record.agent_id,
        record.agent_address,
        record.alarm_code,
        record.alarm_text
    )
}

/// `<ts> GET response from agent <id>: <value>`, or
/// `<ts> GET to agent <id> failed: <reason>`
pub fn get_response_line(record: &QueryRecord) -> String {
    match &record.outcome {
        QueryOutcome::Value(value) => format!(
            "{} GET response from agent {}: {}",
            format_timestamp(&record.timestamp),
            record.agent_id,
            value
        ),
        QueryOutcome::Failed(reason) => format!(
            "{} GET to agent {} failed: {}",
            format_timestamp(&record.timestamp),
            record.agent_id,
            reason
        ),
    }
}

/// `<ts> a trap sent to <addr>`
pub fn trap_sent_line(ts: &NaiveDateTime, target: &SocketAddr) -> String {
    format!("{} a trap sent to {}", format_timestamp(ts), format_address(target))
}
