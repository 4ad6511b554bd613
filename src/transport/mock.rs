//! Scripted transport for tests.
//!
//! Answers requests from a queue of [`MockReply`] values without touching
//! the network and records everything that passes through it.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;

use super::Transport;
use crate::error::{Error, ErrorStatus, Result};
use crate::message::CommunityMessage;
use crate::pdu::Pdu;
use crate::value::Value;
use crate::varbind::VarBind;

/// How the mock answers one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a GET response binding the requested OID to this value.
    Value(Value),
    /// Answer with a GET response carrying this error status and index.
    Status(ErrorStatus, i32),
    /// Answer with these bytes verbatim.
    Raw(Bytes),
    /// Behave as if nothing came back before the timeout.
    Timeout,
    /// Behave as if the datagram could not be delivered.
    Unreachable,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    default_reply: Option<MockReply>,
    requests: Vec<(SocketAddr, CommunityMessage)>,
    sent: Vec<(SocketAddr, Bytes)>,
}

/// Scripted [`Transport`].
///
/// Replies are consumed in order; once the queue is empty every request
/// times out unless [`set_default`](Self::set_default) says otherwise.
///
/// ```rust
/// use snmp_alarm::transport::{MockReply, MockTransport};
///
/// let mock = MockTransport::new();
/// mock.queue(MockReply::Timeout);
/// mock.queue(MockReply::Value("AGENT_ID says Hello.".into()));
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not hide the script from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a reply to the script.
    pub fn queue(&self, reply: MockReply) {
        self.state().replies.push_back(reply);
    }

    /// Reply used once the script is exhausted.
    pub fn set_default(&self, reply: MockReply) {
        self.state().default_reply = Some(reply);
    }

    /// Requests seen so far, decoded, with their targets.
    pub fn requests(&self) -> Vec<(SocketAddr, CommunityMessage)> {
        self.state().requests.clone()
    }

    /// Number of request attempts seen so far.
    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Fire-and-forget datagrams seen so far.
    pub fn sent(&self) -> Vec<(SocketAddr, Bytes)> {
        self.state().sent.clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, data: Bytes, target: SocketAddr) -> Result<()> {
        self.state().sent.push((target, data));
        Ok(())
    }

    async fn request(
        &self,
        data: Bytes,
        target: SocketAddr,
        request_id: i32,
        timeout: Duration,
    ) -> Result<Bytes> {
        let request = CommunityMessage::decode(data)?;
        let reply = {
            let mut state = self.state();
            state.requests.push((target, request.clone()));
            let next = state.replies.pop_front();
            next.or_else(|| state.default_reply.clone())
                .unwrap_or(MockReply::Timeout)
        };

        let requested = request.pdu.varbinds().first().map(|vb| vb.oid.clone());
        let answer = |varbind: VarBind, status: ErrorStatus, index: i32| {
            let pdu = Pdu::response(request_id, varbind).with_error(status, index);
            CommunityMessage::new(request.version, request.community.clone(), pdu).encode()
        };

        match (reply, requested) {
            (MockReply::Value(value), Some(oid)) => {
                Ok(answer(VarBind::new(oid, value), ErrorStatus::NoError, 0))
            }
            (MockReply::Status(status, index), Some(oid)) => {
                Ok(answer(VarBind::null(oid), status, index))
            }
            (MockReply::Value(_) | MockReply::Status(..), None) => Err(Error::MalformedPdu {
                target,
            }
            .boxed()),
            (MockReply::Raw(bytes), _) => Ok(bytes),
            (MockReply::Timeout, _) => Err(Error::Timeout {
                target,
                elapsed: timeout,
                retries: 0,
            }
            .boxed()),
            (MockReply::Unreachable, _) => Err(Error::Unreachable {
                target,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }
            .boxed()),
        }
    }
}
