//! BER encoding into a reverse buffer.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Buffer that grows towards the front.
///
/// Elements are pushed last-to-first: content before its length, length
/// before its tag. [`finish`](Self::finish) flips the storage into wire order.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    reversed: Vec<u8>,
}

impl EncodeBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            reversed: Vec::with_capacity(128),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.reversed.len()
    }

    /// Check whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.reversed.is_empty()
    }

    /// Prepend a tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.reversed.push(tag);
    }

    /// Prepend a length header.
    pub fn push_length(&mut self, len: usize) {
        let (buf, n) = encode_length(len);
        self.reversed.extend_from_slice(&buf[..n]);
    }

    /// Prepend raw bytes, preserving their order on the wire.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.reversed.extend(bytes.iter().rev());
    }

    /// Prepend a constructed element whose content is written by `f`.
    ///
    /// `f` must push its children in reverse order.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Self)) {
        let before = self.reversed.len();
        f(self);
        let content_len = self.reversed.len() - before;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Prepend a SEQUENCE.
    pub fn push_sequence(&mut self, f: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Prepend a signed INTEGER in minimal two's complement form.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        // Drop redundant sign octets.
        while start < 3 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.push_bytes(&bytes[start..]);
        self.push_length(4 - start);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Prepend an unsigned 32-bit value under an application tag.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let bytes = value.to_be_bytes();
        let start = bytes.iter().take(3).take_while(|&&b| b == 0).count();
        let content = &bytes[start..];
        if content[0] & 0x80 != 0 {
            // Leading zero keeps the value positive.
            self.push_bytes(content);
            self.reversed.push(0x00);
            self.push_length(content.len() + 1);
        } else {
            self.push_bytes(content);
            self.push_length(content.len());
        }
        self.push_tag(tag);
    }

    /// Prepend an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Prepend a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Prepend an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &Oid) {
        let content = oid.to_ber();
        self.push_bytes(&content);
        self.push_length(content.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Consume the buffer, returning the bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.reversed.reverse();
        Bytes::from(self.reversed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(f: impl FnOnce(&mut EncodeBuf)) -> Vec<u8> {
        let mut buf = EncodeBuf::new();
        f(&mut buf);
        buf.finish().to_vec()
    }

    #[test]
    fn integers_are_minimal() {
        assert_eq!(encoded(|b| b.push_integer(0)), [0x02, 0x01, 0x00]);
        assert_eq!(encoded(|b| b.push_integer(127)), [0x02, 0x01, 0x7F]);
        assert_eq!(encoded(|b| b.push_integer(128)), [0x02, 0x02, 0x00, 0x80]);
        assert_eq!(encoded(|b| b.push_integer(-1)), [0x02, 0x01, 0xFF]);
        assert_eq!(encoded(|b| b.push_integer(-129)), [0x02, 0x02, 0xFF, 0x7F]);
        assert_eq!(
            encoded(|b| b.push_integer(i32::MIN)),
            [0x02, 0x04, 0x80, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn unsigned_gets_leading_zero_when_high_bit_set() {
        assert_eq!(
            encoded(|b| b.push_unsigned32(tag::application::TIMETICKS, 5000)),
            [0x43, 0x02, 0x13, 0x88]
        );
        assert_eq!(
            encoded(|b| b.push_unsigned32(tag::application::GAUGE32, u32::MAX)),
            [0x42, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            encoded(|b| b.push_unsigned32(tag::application::COUNTER32, 0)),
            [0x41, 0x01, 0x00]
        );
    }

    #[test]
    fn nested_sequence() {
        let bytes = encoded(|b| {
            b.push_sequence(|b| {
                b.push_null();
                b.push_oid(&crate::oid!(1, 3, 6, 1));
            })
        });
        assert_eq!(bytes, [0x30, 0x07, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x05, 0x00]);
    }

    #[test]
    fn long_content_uses_long_form_length() {
        let data = vec![b'x'; 200];
        let bytes = encoded(|b| b.push_octet_string(&data));
        assert_eq!(&bytes[..3], &[0x04, 0x81, 200]);
        assert_eq!(bytes.len(), 203);
    }
}
