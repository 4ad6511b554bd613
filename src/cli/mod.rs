//! Shared pieces of the `alarm-agent` and `alarm-manager` binaries.

pub mod args;

use crate::sink::EventSink;

/// Prints each event line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutEventSink;

impl EventSink for StdoutEventSink {
    fn notify(&self, line: &str) {
        println!("{line}");
    }
}
