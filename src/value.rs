//! Values carried in variable bindings.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::Result;
use crate::error::internal::DecodeErrorKind;
use crate::oid::Oid;
use crate::util::encode_hex;

/// A binding's value.
///
/// Alarm fields travel as [`Value::OctetString`]; the notification marker is
/// a [`Value::ObjectIdentifier`]; sysUpTime is [`Value::TimeTicks`]. A GET
/// carries [`Value::Null`] as its placeholder and a responder that does not
/// know the requested OID answers [`Value::NoSuchObject`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit)
    Integer(i32),

    /// OCTET STRING (arbitrary bytes, usually text)
    OctetString(Bytes),

    /// NULL, the unset placeholder of a request
    Null,

    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),

    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),

    /// Gauge32 (unsigned 32-bit, non-wrapping)
    Gauge32(u32),

    /// TimeTicks (hundredths of a second)
    TimeTicks(u32),

    /// noSuchObject exception
    NoSuchObject,

    /// noSuchInstance exception
    NoSuchInstance,
}

impl Value {
    /// Text of an [`Value::OctetString`], if it is valid UTF-8.
    ///
    /// ```
    /// use snmp_alarm::Value;
    ///
    /// assert_eq!(Value::from("Elevator jammed!").as_str(), Some("Elevator jammed!"));
    /// assert_eq!(Value::Integer(666).as_str(), None);
    /// ```
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::OctetString(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// The OID of an [`Value::ObjectIdentifier`].
    pub fn as_oid(&self) -> Option<&Oid> {
        if let Value::ObjectIdentifier(oid) = self {
            Some(oid)
        } else {
            None
        }
    }

    /// Whether a responder used this value to say it has no such object.
    pub fn is_exception(&self) -> bool {
        matches!(self, Value::NoSuchObject | Value::NoSuchInstance)
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(n) => buf.push_integer(*n),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::Counter32(n) | Value::Gauge32(n) | Value::TimeTicks(n) => {
                buf.push_unsigned32(self.tag(), *n)
            }
            Value::NoSuchObject | Value::NoSuchInstance => {
                buf.push_length(0);
                buf.push_tag(self.tag());
            }
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Integer(_) => tag::universal::INTEGER,
            Value::OctetString(_) => tag::universal::OCTET_STRING,
            Value::Null => tag::universal::NULL,
            Value::ObjectIdentifier(_) => tag::universal::OBJECT_IDENTIFIER,
            Value::Counter32(_) => tag::application::COUNTER32,
            Value::Gauge32(_) => tag::application::GAUGE32,
            Value::TimeTicks(_) => tag::application::TIMETICKS,
            Value::NoSuchObject => tag::context::NO_SUCH_OBJECT,
            Value::NoSuchInstance => tag::context::NO_SUCH_INSTANCE,
        }
    }

    /// Decode from BER.
    ///
    /// Tags outside the modelled set are a decode error rather than an
    /// opaque catch-all.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        use tag::{application as app, context as ctx, universal as uni};

        let found = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let value = match found {
            uni::INTEGER => Value::Integer(decoder.read_integer_value(len)?),
            uni::OCTET_STRING => Value::OctetString(decoder.read_bytes(len)?),
            uni::OBJECT_IDENTIFIER => Value::ObjectIdentifier(decoder.read_oid_value(len)?),
            app::COUNTER32 | app::GAUGE32 | app::TIMETICKS => {
                let n = decoder.read_unsigned32_value(len)?;
                match found {
                    app::COUNTER32 => Value::Counter32(n),
                    app::GAUGE32 => Value::Gauge32(n),
                    _ => Value::TimeTicks(n),
                }
            }
            uni::NULL | ctx::NO_SUCH_OBJECT | ctx::NO_SUCH_INSTANCE => {
                decoder.read_empty(len)?;
                match found {
                    uni::NULL => Value::Null,
                    ctx::NO_SUCH_OBJECT => Value::NoSuchObject,
                    _ => Value::NoSuchInstance,
                }
            }
            other => return Err(decoder.fail(DecodeErrorKind::UnknownValueTag(other))),
        };
        Ok(value)
    }
}

/// Renders values the way they are written into records: text as text,
/// binary octets as `0x` hex, uptime as `HH:MM:SS.cc` with a day count.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(text) => f.write_str(text),
                Err(_) => write!(f, "0x{}", encode_hex(data)),
            },
            Value::Integer(n) => write!(f, "{n}"),
            Value::Counter32(n) | Value::Gauge32(n) => write!(f, "{n}"),
            Value::TimeTicks(ticks) => {
                let (secs, centis) = (ticks / 100, ticks % 100);
                write!(
                    f,
                    "{}d {:02}:{:02}:{:02}.{:02}",
                    secs / 86_400,
                    secs % 86_400 / 3600,
                    secs % 3600 / 60,
                    secs % 60,
                    centis
                )
            }
            Value::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Value::Null => f.write_str("NULL"),
            Value::NoSuchObject => f.write_str("noSuchObject"),
            Value::NoSuchInstance => f.write_str("noSuchInstance"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn roundtrip(value: Value) -> Value {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        let mut dec = Decoder::new(buf.finish());
        let decoded = Value::decode(&mut dec).unwrap();
        assert!(dec.is_empty());
        decoded
    }

    #[test]
    fn every_variant_survives_the_wire() {
        for value in [
            Value::Integer(-666),
            Value::from("AGENT_ID says Hello."),
            Value::Null,
            Value::from(oid!(1, 2, 3, 4, 5)),
            Value::Counter32(u32::MAX),
            Value::Gauge32(0),
            Value::TimeTicks(5000),
            Value::NoSuchObject,
            Value::NoSuchInstance,
        ] {
            assert_eq!(roundtrip(value.clone()), value);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        // IpAddress is not modelled
        let mut dec = Decoder::from_slice(&[0x40, 0x04, 127, 0, 0, 1]);
        assert!(Value::decode(&mut dec).is_err());
    }

    #[test]
    fn exception_with_content_is_rejected() {
        let mut dec = Decoder::from_slice(&[0x80, 0x01, 0x00]);
        assert!(Value::decode(&mut dec).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Value::from("666").to_string(), "666");
        assert_eq!(Value::TimeTicks(5000).to_string(), "0d 00:00:50.00");
        assert_eq!(Value::TimeTicks(8_640_123).to_string(), "1d 00:00:01.23");
        assert_eq!(
            Value::OctetString(Bytes::from_static(&[0xFF, 0x00])).to_string(),
            "0xff00"
        );
        assert_eq!(Value::NoSuchObject.to_string(), "noSuchObject");
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(oid!(1, 3)).as_oid(), Some(&oid!(1, 3)));
        assert!(Value::NoSuchInstance.is_exception());
        assert!(!Value::Null.is_exception());
    }
}
