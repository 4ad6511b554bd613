//! Variable binding (VarBind) type.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding: an OID paired with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    /// Create a binding.
    pub fn new(oid: Oid, value: impl Into<Value>) -> Self {
        Self {
            oid,
            value: value.into(),
        }
    }

    /// Create a binding holding the NULL request placeholder.
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        seq.finish()?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a binding list as a SEQUENCE of bindings, preserving order.
pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        // reverse buffer
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

/// Decode a SEQUENCE of bindings.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;
    let mut varbinds = Vec::with_capacity((seq.remaining() / 16).max(1));

    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }

    Ok(varbinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn list_order_is_preserved() {
        let varbinds = vec![
            VarBind::new(oid!(1, 2, 3, 4, 5, 2), "AGENT_ID"),
            VarBind::new(oid!(1, 2, 3, 4, 5, 1), "666"),
            VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)),
        ];

        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &varbinds);
        let mut dec = Decoder::new(buf.finish());
        assert_eq!(decode_varbind_list(&mut dec).unwrap(), varbinds);
    }

    #[test]
    fn empty_list() {
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &[]);
        let bytes = buf.finish();
        assert_eq!(&bytes[..], &[0x30, 0x00]);
        assert!(decode_varbind_list(&mut Decoder::new(bytes)).unwrap().is_empty());
    }

    #[test]
    fn binding_with_extra_element_is_rejected() {
        // SEQUENCE { OID 1.3, NULL, NULL }
        let mut dec = Decoder::from_slice(&[0x30, 0x07, 0x06, 0x01, 0x2B, 0x05, 0x00, 0x05, 0x00]);
        assert!(VarBind::decode(&mut dec).is_err());
    }

    #[test]
    fn display() {
        let vb = VarBind::new(oid!(1, 2, 3, 4, 5, 3), "Elevator jammed!");
        assert_eq!(vb.to_string(), "1.2.3.4.5.3 = Elevator jammed!");
    }
}
