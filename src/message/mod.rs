//! Message envelope.
//!
//! Every datagram is `SEQUENCE { version INTEGER, community OCTET STRING,
//! pdu PDU }` (RFC 1901).

mod community;

pub use community::{CommunityMessage, DEFAULT_COMMUNITY};
