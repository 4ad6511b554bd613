//! BER length encoding and decoding.
//!
//! Length encoding follows X.690 Section 8.1.3:
//! - Short form: Single byte, bit 8=0, value 0-127
//! - Long form: Initial byte (bit 8=1, bits 7-1=count), followed by length bytes
//! - Indefinite form (0x80): Rejected

use crate::error::internal::DecodeErrorKind;

/// Maximum content length accepted by the decoder.
///
/// Nothing this crate exchanges comes close; a UDP datagram cannot exceed
/// 64KB anyway. The limit guards the decoder against absurd length fields.
pub const MAX_LENGTH: usize = 0x10000;

/// Encode a length, returning the bytes in reverse order for prepending.
pub(crate) fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut remaining = len;
    let mut count = 0;
    while remaining > 0 && count < 4 {
        buf[count] = remaining as u8;
        remaining >>= 8;
        count += 1;
    }
    buf[count] = 0x80 | count as u8;
    (buf, count + 1)
}

/// Decode a length, returning (length, bytes consumed).
pub(crate) fn decode_length(data: &[u8]) -> Result<(usize, usize), DecodeErrorKind> {
    let Some(&first) = data.first() else {
        return Err(DecodeErrorKind::TruncatedData);
    };

    if first == 0x80 {
        return Err(DecodeErrorKind::IndefiniteLength);
    }

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;
    if num_octets > 4 {
        return Err(DecodeErrorKind::LengthTooLong { octets: num_octets });
    }
    let Some(octets) = data.get(1..1 + num_octets) else {
        return Err(DecodeErrorKind::TruncatedData);
    };

    let len = octets
        .iter()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize);
    if len > MAX_LENGTH {
        return Err(DecodeErrorKind::LengthExceedsMax {
            length: len,
            max: MAX_LENGTH,
        });
    }

    Ok((len, 1 + num_octets))
}
