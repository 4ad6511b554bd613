//! In-memory record store.

use std::sync::{Mutex, MutexGuard};

use super::{AlarmRecord, QueryRecord, RecordSink};

/// A record in the order it was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Alarm(AlarmRecord),
    Query(QueryRecord),
}

/// Keeps every record in memory, in append order.
///
/// Useful for tests and for embedding the manager in a process that
/// displays records itself.
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    records: Mutex<Vec<Record>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every record, alarms and queries interleaved as appended.
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Alarms only.
    pub fn alarms(&self) -> Vec<AlarmRecord> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                Record::Alarm(a) => Some(a.clone()),
                Record::Query(_) => None,
            })
            .collect()
    }

    /// GET results only.
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                Record::Query(q) => Some(q.clone()),
                Record::Alarm(_) => None,
            })
            .collect()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl RecordSink for MemoryRecordSink {
    fn append_alarm(&self, record: &AlarmRecord) -> std::io::Result<()> {
        self.lock().push(Record::Alarm(record.clone()));
        Ok(())
    }

    fn append_query(&self, record: &QueryRecord) -> std::io::Result<()> {
        self.lock().push(Record::Query(record.clone()));
        Ok(())
    }
}
