//! Protocol Data Units (PDUs).
//!
//! Three kinds exist: the v2 TRAP an agent emits, the GET a manager sends
//! back, and the GET response. Each kind has a binding invariant that is
//! checked by every constructor and by [`Pdu::decode`], so a `Pdu` value
//! that exists is always one that may go on the wire.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::internal::DecodeErrorKind;
use crate::error::{EncodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::oids;
use crate::value::Value;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU kind, represented by its context tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduKind {
    /// GetRequest-PDU
    Get = tag::pdu::GET_REQUEST,
    /// Response-PDU
    GetResponse = tag::pdu::RESPONSE,
    /// SNMPv2-Trap-PDU
    Trap = tag::pdu::TRAP_V2,
}

impl PduKind {
    /// Create from tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            tag::pdu::GET_REQUEST => Some(Self::Get),
            tag::pdu::RESPONSE => Some(Self::GetResponse),
            tag::pdu::TRAP_V2 => Some(Self::Trap),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::GetResponse => write!(f, "GET_RESPONSE"),
            Self::Trap => write!(f, "TRAP"),
        }
    }
}

/// A protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    kind: PduKind,
    request_id: i32,
    error_status: i32,
    error_index: i32,
    varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GET for a single OID.
    pub fn get(request_id: i32, oid: Oid) -> Self {
        Self {
            kind: PduKind::Get,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::null(oid)],
        }
    }

    /// Create a GET response carrying one resolved binding.
    pub fn response(request_id: i32, varbind: VarBind) -> Self {
        Self {
            kind: PduKind::GetResponse,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![varbind],
        }
    }

    /// Create a trap.
    ///
    /// `varbinds` must contain `snmpTrapOID.0` with an OID value; RFC 3416
    /// places it second, after `sysUpTime.0`, but any position is accepted.
    ///
    /// ```
    /// use snmp_alarm::{Pdu, VarBind, Value, oids};
    ///
    /// let trap = Pdu::trap(1, vec![
    ///     VarBind::new(oids::sys_uptime(), Value::TimeTicks(0)),
    ///     VarBind::new(oids::snmp_trap_oid(), oids::cold_start()),
    /// ]).unwrap();
    /// assert_eq!(trap.notification_oid(), Some(&oids::cold_start()));
    ///
    /// assert!(Pdu::trap(2, vec![]).is_err());
    /// ```
    pub fn trap(request_id: i32, varbinds: Vec<VarBind>) -> Result<Self> {
        let pdu = Self {
            kind: PduKind::Trap,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        };
        pdu.check().map_err(|kind| Error::Encode(kind).boxed())?;
        Ok(pdu)
    }

    /// Create a trap with the standard prefix: `sysUpTime.0` set to
    /// `uptime`, `snmpTrapOID.0` set to `notification`, then `varbinds`.
    pub fn notification(
        request_id: i32,
        uptime: u32,
        notification: Oid,
        varbinds: impl IntoIterator<Item = VarBind>,
    ) -> Self {
        let mut all = vec![
            VarBind::new(oids::sys_uptime(), Value::TimeTicks(uptime)),
            VarBind::new(oids::snmp_trap_oid(), notification),
        ];
        all.extend(varbinds);
        Self {
            kind: PduKind::Trap,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: all,
        }
    }

    /// Replace the error fields of a GET response.
    pub fn with_error(mut self, status: ErrorStatus, index: i32) -> Self {
        self.error_status = status.as_i32();
        self.error_index = index;
        self
    }

    /// The PDU kind.
    pub fn kind(&self) -> PduKind {
        self.kind
    }

    /// Request id for correlating a response with its GET.
    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    /// Error status (always `noError` outside responses).
    pub fn error_status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// 1-based index of the binding an error refers to.
    pub fn error_index(&self) -> i32 {
        self.error_index
    }

    /// Bindings in wire order.
    pub fn varbinds(&self) -> &[VarBind] {
        &self.varbinds
    }

    /// Consume the PDU, returning its bindings.
    pub fn into_varbinds(self) -> Vec<VarBind> {
        self.varbinds
    }

    /// Look up a binding by exact OID equality.
    ///
    /// A descendant never matches its ancestor: looking up `1.2.3.4.5`
    /// does not find `1.2.3.4.5.1`.
    pub fn binding(&self, oid: &Oid) -> Option<&Value> {
        self.varbinds
            .iter()
            .find(|vb| &vb.oid == oid)
            .map(|vb| &vb.value)
    }

    /// Value of `snmpTrapOID.0`, when it holds an OID.
    pub fn notification_oid(&self) -> Option<&Oid> {
        self.binding(&oids::snmp_trap_oid())
            .and_then(Value::as_oid)
    }

    fn check(&self) -> std::result::Result<(), EncodeErrorKind> {
        match self.kind {
            PduKind::Trap => {
                if self.notification_oid().is_none() {
                    return Err(EncodeErrorKind::MissingTrapOid);
                }
            }
            PduKind::Get | PduKind::GetResponse => {
                if self.varbinds.len() != 1 {
                    return Err(EncodeErrorKind::BindingCount {
                        expected: 1,
                        actual: self.varbinds.len(),
                    });
                }
                if self.kind == PduKind::Get && self.varbinds[0].value != Value::Null {
                    return Err(EncodeErrorKind::NonNullRequest);
                }
            }
        }
        Ok(())
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.kind.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER, enforcing the kind's binding invariant.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder
            .peek_tag()
            .ok_or_else(|| decoder.fail(DecodeErrorKind::TruncatedData))?;
        let kind =
            PduKind::from_tag(tag).ok_or_else(|| decoder.fail(DecodeErrorKind::UnknownPduType(tag)))?;

        let mut pdu_decoder = decoder.read_constructed(tag)?;
        let request_id = pdu_decoder.read_integer()?;
        let error_status = pdu_decoder.read_integer()?;
        let error_index = pdu_decoder.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu_decoder)?;
        pdu_decoder.finish()?;

        let pdu = Pdu {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        };
        pdu.check()
            .map_err(|kind| pdu_decoder.fail(DecodeErrorKind::BindingInvariant(kind)))?;
        Ok(pdu)
    }

    /// Encode this PDU alone (without the message envelope).
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode a PDU produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let pdu = Self::decode(&mut decoder)?;
        decoder.finish()?;
        Ok(pdu)
    }
}
