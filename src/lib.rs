//! # snmp-alarm
//!
//! SNMPv2c alarm exchange built on Tokio: an [`Agent`] raises alarms as
//! traps, a [`Manager`] records each alarm, queries the raising agent for
//! its `sysDescr.0`, and records the answer.
//!
//! ## Features
//!
//! - Zero-copy BER encoding/decoding of SNMPv2c messages
//! - Typed PDUs whose binding invariants hold by construction
//! - Per-trap correlation tasks with bounded GET retries
//! - Pluggable persistence ([`sink::RecordSink`]) and display
//!   ([`sink::EventSink`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snmp_alarm::{Agent, Manager};
//! use snmp_alarm::sink::MemoryRecordSink;
//!
//! #[tokio::main]
//! async fn main() -> snmp_alarm::Result<()> {
//!     let records = Arc::new(MemoryRecordSink::new());
//!     let manager = Manager::builder()
//!         .bind("127.0.0.1/1620")
//!         .records(records.clone())
//!         .build()
//!         .await?;
//!     let listening = tokio::spawn({
//!         let manager = manager.clone();
//!         async move { manager.run().await }
//!     });
//!
//!     let agent = Agent::builder("AGENT_ID")
//!         .bind("127.0.0.1/1610")
//!         .manager("127.0.0.1/1620")
//!         .build()
//!         .await?;
//!     let serving = tokio::spawn({
//!         let agent = agent.clone();
//!         async move { agent.run().await }
//!     });
//!
//!     agent.send_trap().await;
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!
//!     manager.stop();
//!     agent.stop();
//!     listening.await.ok();
//!     serving.await.ok();
//!
//!     for record in records.records() {
//!         println!("{record:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod ber;
pub mod client;
pub mod error;
pub mod manager;
pub mod message;
pub mod oid;
pub mod oids;
pub mod pdu;
pub mod sink;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

// Re-exports for convenience
pub use agent::{Agent, AgentBuilder};
pub use client::{Backoff, Client, Retry, Target};
pub use error::{EncodeErrorKind, Error, ErrorStatus, Result, TrapDefect};
pub use manager::{CorrelationReport, Manager, ManagerBuilder, Querier, TrapFields};
pub use message::{CommunityMessage, DEFAULT_COMMUNITY};
pub use oid::Oid;
pub use pdu::{Pdu, PduKind};
pub use sink::{AlarmRecord, EventSink, QueryOutcome, QueryRecord, RecordSink};
pub use transport::{Listener, Transport, UdpTransport};
pub use util::{format_address, parse_address};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// Testing utilities exposed via the `testing` feature.
#[cfg(feature = "testing")]
pub mod testing {
    pub use crate::transport::{MockReply, MockTransport};
}
