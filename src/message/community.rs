//! Community-based message format (v1/v2c).

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::pdu::Pdu;
use crate::version::Version;

/// The shared credential both roles use unless configured otherwise.
pub const DEFAULT_COMMUNITY: &[u8] = b"public";

/// Community-based message (v1/v2c).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityMessage {
    /// Protocol version
    pub version: Version,
    /// Community string
    pub community: Bytes,
    /// Protocol data unit
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a message.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Create a v2c message.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });

        buf.finish()
    }

    /// Decode a complete datagram.
    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_from(Decoder::new(data))
    }

    /// Decode a complete datagram received from `source`.
    ///
    /// Errors name `source` as the offending peer.
    pub fn decode_with_target(data: Bytes, source: SocketAddr) -> Result<Self> {
        Self::decode_from(Decoder::with_target(data, source))
    }

    fn decode_from(mut decoder: Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        decoder.finish()?;

        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num)
            .ok_or_else(|| seq.fail(DecodeErrorKind::UnknownVersion(version_num)))?;
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        seq.finish()?;

        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    /// Consume and return the PDU.
    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}
