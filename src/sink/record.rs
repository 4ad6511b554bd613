//! Append-only correlation records and their line format.
//!
//! Fields are comma separated. A backslash escapes `\`, `,`, and line
//! breaks (`\n`, `\r`), so every field round-trips whatever it contains.

use std::fmt;

use chrono::{Local, NaiveDateTime, SubsecRound};

/// Timestamp layout used in records and event lines.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S%.3f";

/// Current local time at millisecond precision.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(3)
}

/// Render a timestamp in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// A line that is not a valid record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseRecordError {
    #[error("expected {expected} fields, found {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("unknown outcome {0:?}")]
    Outcome(String),
}

/// One accepted trap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRecord {
    pub timestamp: NaiveDateTime,
    pub agent_id: String,
    pub agent_address: String,
    pub alarm_code: String,
    pub alarm_text: String,
}

impl AlarmRecord {
    /// Record stamped with the current time.
    pub fn new(
        agent_id: impl Into<String>,
        agent_address: impl Into<String>,
        alarm_code: impl Into<String>,
        alarm_text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now(),
            agent_id: agent_id.into(),
            agent_address: agent_address.into(),
            alarm_code: alarm_code.into(),
            alarm_text: alarm_text.into(),
        }
    }

    /// `timestamp,agent_id,agent_address,alarm_code,alarm_text`
    pub fn to_line(&self) -> String {
        join(&[
            &format_timestamp(&self.timestamp),
            &self.agent_id,
            &self.agent_address,
            &self.alarm_code,
            &self.alarm_text,
        ])
    }

    /// Inverse of [`to_line`](Self::to_line).
    pub fn parse_line(line: &str) -> Result<Self, ParseRecordError> {
        let [ts, agent_id, agent_address, alarm_code, alarm_text] = split::<5>(line)?;
        Ok(Self {
            timestamp: parse_timestamp(&ts)?,
            agent_id,
            agent_address,
            alarm_code,
            alarm_text,
        })
    }
}

impl fmt::Display for AlarmRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// What a GET produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The agent's value, rendered as text.
    Value(String),
    /// No usable answer; the reason is kept for the log.
    Failed(String),
}

impl QueryOutcome {
    fn tag(&self) -> &'static str {
        match self {
            Self::Value(_) => "ok",
            Self::Failed(_) => "failed",
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Value(text) | Self::Failed(text) => text,
        }
    }

    /// Whether the GET succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// One completed or attempted GET, keyed by the agent id it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub timestamp: NaiveDateTime,
    pub agent_id: String,
    pub outcome: QueryOutcome,
}

impl QueryRecord {
    /// Successful GET stamped with the current time.
    pub fn value(agent_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            agent_id: agent_id.into(),
            outcome: QueryOutcome::Value(value.into()),
        }
    }

    /// Failed GET stamped with the current time.
    pub fn failed(agent_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            agent_id: agent_id.into(),
            outcome: QueryOutcome::Failed(reason.into()),
        }
    }

    /// `timestamp,agent_id,ok,value` or `timestamp,agent_id,failed,reason`
    pub fn to_line(&self) -> String {
        join(&[
            &format_timestamp(&self.timestamp),
            &self.agent_id,
            self.outcome.tag(),
            self.outcome.text(),
        ])
    }

    /// Inverse of [`to_line`](Self::to_line).
    pub fn parse_line(line: &str) -> Result<Self, ParseRecordError> {
        let [ts, agent_id, tag, text] = split::<4>(line)?;
        let outcome = match tag.as_str() {
            "ok" => QueryOutcome::Value(text),
            "failed" => QueryOutcome::Failed(text),
            _ => return Err(ParseRecordError::Outcome(tag)),
        };
        Ok(Self {
            timestamp: parse_timestamp(&ts)?,
            agent_id,
            outcome,
        })
    }
}

impl fmt::Display for QueryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, ParseRecordError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|_| ParseRecordError::Timestamp(text.to_owned()))
}

fn join(fields: &[&str]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        for c in field.chars() {
            match c {
                '\\' => line.push_str("\\\\"),
                ',' => line.push_str("\\,"),
                '\n' => line.push_str("\\n"),
                '\r' => line.push_str("\\r"),
                c => line.push(c),
            }
        }
    }
    line
}

fn split<const N: usize>(line: &str) -> Result<[String; N], ParseRecordError> {
    let mut fields = Vec::with_capacity(N);
    let mut field = String::new();
    let mut chars = line.trim_end_matches(['\n', '\r']).chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => field.push('\n'),
                Some('r') => field.push('\r'),
                Some(other) => field.push(other),
                None => field.push('\\'),
            },
            ',' => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);

    let actual = fields.len();
    fields
        .try_into()
        .map_err(|_| ParseRecordError::FieldCount { expected: N, actual })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(7, 5, 3, 42)
            .unwrap()
    }

    #[test]
    fn alarm_line_layout() {
        let record = AlarmRecord {
            timestamp: ts(),
            ..AlarmRecord::new("AGENT_ID", "127.0.0.1/1610", "666", "Elevator jammed!")
        };
        assert_eq!(
            record.to_line(),
            "09.03.2024 07:05:03.042,AGENT_ID,127.0.0.1/1610,666,Elevator jammed!"
        );
        assert_eq!(AlarmRecord::parse_line(&record.to_line()).unwrap(), record);
    }

    #[test]
    fn query_line_layout() {
        let ok = QueryRecord {
            timestamp: ts(),
            ..QueryRecord::value("AGENT_ID", "AGENT_ID says Hello.")
        };
        assert_eq!(
            ok.to_line(),
            "09.03.2024 07:05:03.042,AGENT_ID,ok,AGENT_ID says Hello."
        );

        let failed = QueryRecord {
            timestamp: ts(),
            ..QueryRecord::failed("AGENT_ID", "timeout")
        };
        assert_eq!(failed.to_line(), "09.03.2024 07:05:03.042,AGENT_ID,failed,timeout");
        assert!(!failed.outcome.is_ok());
        assert_eq!(QueryRecord::parse_line(&failed.to_line()).unwrap(), failed);
    }

    #[test]
    fn hostile_fields_survive() {
        let record = AlarmRecord {
            timestamp: ts(),
            ..AlarmRecord::new("a,b", "c\\d", "line\nbreak\r", ",\\,")
        };
        let line = record.to_line();
        assert!(!line.contains('\n'));
        assert_eq!(AlarmRecord::parse_line(&line).unwrap(), record);
    }

    #[test]
    fn now_has_millisecond_precision() {
        let record = QueryRecord::value("x", "y");
        assert_eq!(QueryRecord::parse_line(&record.to_line()).unwrap(), record);
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(
            AlarmRecord::parse_line("09.03.2024 07:05:03.042,a,b"),
            Err(ParseRecordError::FieldCount {
                expected: 5,
                actual: 3
            })
        );
        assert!(matches!(
            QueryRecord::parse_line("yesterday,a,ok,b"),
            Err(ParseRecordError::Timestamp(_))
        ));
        assert!(matches!(
            QueryRecord::parse_line("09.03.2024 07:05:03.042,a,maybe,b"),
            Err(ParseRecordError::Outcome(_))
        ));
    }
}
