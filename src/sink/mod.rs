//! Where correlation results go.
//!
//! Two independent seams: a [`RecordSink`] durably appends
//! [`AlarmRecord`]s and [`QueryRecord`]s, an [`EventSink`] receives
//! human-readable lines for display. Both are shared across correlation
//! tasks and serialize their own writes.

mod events;
mod file;
mod memory;
mod record;

pub use events::{
    ChannelEventSink, EventSink, TracingEventSink, get_response_line, trap_line, trap_sent_line,
};
pub use file::{ALARM_LOG, FileRecordSink, QUERY_LOG, read_alarms, read_queries};
pub use memory::{MemoryRecordSink, Record};
pub use record::{
    AlarmRecord, ParseRecordError, QueryOutcome, QueryRecord, TIMESTAMP_FORMAT, format_timestamp,
    now,
};

use std::io;

/// Append-only persistence for correlation records.
///
/// Calls come from many tasks at once; implementations must keep each
/// record intact (no interleaving within a record).
pub trait RecordSink: Send + Sync + 'static {
    /// Persist an accepted trap.
    fn append_alarm(&self, record: &AlarmRecord) -> io::Result<()>;

    /// Persist the outcome of a GET.
    fn append_query(&self, record: &QueryRecord) -> io::Result<()>;
}
