//! Tag octets used on the wire.

/// UNIVERSAL class tags.
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
}

/// APPLICATION class tags (RFC 2578 SMIv2 types).
pub mod application {
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
}

/// Context-specific varbind exceptions (RFC 3416).
pub mod context {
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
}

/// Context-specific constructed PDU tags.
pub mod pdu {
    pub const GET_REQUEST: u8 = 0xA0;
    pub const RESPONSE: u8 = 0xA2;
    pub const TRAP_V2: u8 = 0xA7;
}
