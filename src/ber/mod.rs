//! Basic Encoding Rules (X.690) codec.
//!
//! Encoding writes back to front into an [`EncodeBuf`] so that every length
//! is known before its header is emitted. Decoding slices a shared
//! [`bytes::Bytes`] buffer without copying.

mod decode;
mod encode;
pub(crate) mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::MAX_LENGTH;
