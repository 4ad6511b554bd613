//! Line-per-record files.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{AlarmRecord, QueryRecord, RecordSink};

/// File name used for alarms by [`FileRecordSink::in_dir`].
pub const ALARM_LOG: &str = "alarms.txt";
/// File name used for GET results by [`FileRecordSink::in_dir`].
pub const QUERY_LOG: &str = "queries.txt";

/// Appends each record as one line to one of two files.
///
/// Files are opened in append mode and created when missing, so a
/// restarted manager continues the existing logs.
///
/// Each append is a blocking write and flush. The manager runs appends on
/// the blocking pool; other async callers should do the same.
///
/// ```rust,no_run
/// use snmp_alarm::sink::FileRecordSink;
///
/// let sink = FileRecordSink::in_dir("/var/log/alarms").unwrap();
/// ```
#[derive(Debug)]
pub struct FileRecordSink {
    alarms: Mutex<File>,
    queries: Mutex<File>,
    alarms_path: PathBuf,
    queries_path: PathBuf,
}

impl FileRecordSink {
    /// Open (or create) the two log files.
    pub fn open(alarms: impl AsRef<Path>, queries: impl AsRef<Path>) -> io::Result<Self> {
        let alarms_path = alarms.as_ref().to_path_buf();
        let queries_path = queries.as_ref().to_path_buf();
        Ok(Self {
            alarms: Mutex::new(open_append(&alarms_path)?),
            queries: Mutex::new(open_append(&queries_path)?),
            alarms_path,
            queries_path,
        })
    }

    /// Open [`ALARM_LOG`] and [`QUERY_LOG`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        Self::open(dir.join(ALARM_LOG), dir.join(QUERY_LOG))
    }

    /// Path of the alarm log.
    pub fn alarms_path(&self) -> &Path {
        &self.alarms_path
    }

    /// Path of the GET log.
    pub fn queries_path(&self) -> &Path {
        &self.queries_path
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn lock(file: &Mutex<File>) -> MutexGuard<'_, File> {
    file.lock().unwrap_or_else(|e| e.into_inner())
}

fn append_line(file: &Mutex<File>, line: &str) -> io::Result<()> {
    let mut file = lock(file);
    // single write per record
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())?;
    file.flush()
}

impl RecordSink for FileRecordSink {
    fn append_alarm(&self, record: &AlarmRecord) -> io::Result<()> {
        tracing::trace!(target: "snmp_alarm::sink", { path = %self.alarms_path.display() }, "appending alarm");
        append_line(&self.alarms, &record.to_line())
    }

    fn append_query(&self, record: &QueryRecord) -> io::Result<()> {
        tracing::trace!(target: "snmp_alarm::sink", { path = %self.queries_path.display() }, "appending query result");
        append_line(&self.queries, &record.to_line())
    }
}

/// Read back every record of an alarm log.
pub fn read_alarms(path: impl AsRef<Path>) -> io::Result<Vec<AlarmRecord>> {
    read_lines(path.as_ref(), AlarmRecord::parse_line)
}

/// Read back every record of a GET log.
pub fn read_queries(path: impl AsRef<Path>) -> io::Result<Vec<QueryRecord>> {
    read_lines(path.as_ref(), QueryRecord::parse_line)
}

fn read_lines<T, E: std::error::Error + Send + Sync + 'static>(
    path: &Path,
    parse: impl Fn(&str) -> Result<T, E>,
) -> io::Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        records.push(parse(&line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileRecordSink::in_dir(dir.path()).unwrap();

        let alarm = AlarmRecord::new("A1", "127.0.0.1/1610", "666", "Elevator jammed!");
        let query = QueryRecord::value("A1", "A1 says Hello.");
        sink.append_alarm(&alarm).unwrap();
        sink.append_query(&query).unwrap();
        sink.append_query(&QueryRecord::failed("A2", "timeout, 3 attempts")).unwrap();

        assert_eq!(read_alarms(sink.alarms_path()).unwrap(), vec![alarm]);
        let queries = read_queries(dir.path().join(QUERY_LOG)).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0], query);
        assert_eq!(queries[1].agent_id, "A2");
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        for id in ["first", "second"] {
            let sink = FileRecordSink::in_dir(dir.path()).unwrap();
            sink.append_alarm(&AlarmRecord::new(id, "h/1", "1", "t")).unwrap();
        }

        let ids: Vec<_> = read_alarms(dir.path().join(ALARM_LOG))
            .unwrap()
            .into_iter()
            .map(|r| r.agent_id)
            .collect();
        assert_eq!(ids, ["first", "second"]);
    }

    #[test]
    fn corrupt_line_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "not,a,record\n").unwrap();
        assert_eq!(read_alarms(&path).unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileRecordSink::in_dir(dir.path().join("nope")).is_err());
    }
}
