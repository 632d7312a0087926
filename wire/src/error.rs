use thiserror::Error;

/// Errors raised while encoding, decoding or exchanging messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Access of {len} bytes at offset {offset} is outside a buffer of {available} bytes")]
    OutOfBounds {
        offset:    usize,
        len:       usize,
        available: usize,
    },

    #[error("Invalid boolean byte {0}")]
    InvalidBool(u8),

    #[error("Invalid presence marker {0:#x}")]
    InvalidPresence(u64),

    #[error("Invalid handle marker {0:#x}")]
    InvalidHandleMarker(u32),

    #[error("Non-nullable {0} is absent")]
    UnexpectedNull(&'static str),

    #[error("Ran out of handles while decoding")]
    MissingHandle,

    #[error("String is not valid UTF-8")]
    InvalidUtf8,

    #[error("Length {len} exceeds the declared bound of {max}")]
    BoundExceeded { len: usize, max: usize },

    #[error("Unknown value {value} for enum {type_name}")]
    UnknownEnumValue { type_name: &'static str, value: u64 },

    #[error("Unknown bits {bits:#x} for {type_name}")]
    UnknownBits { type_name: &'static str, bits: u64 },

    #[error("Unknown ordinal {ordinal} for strict union {type_name}")]
    UnknownUnionOrdinal { type_name: &'static str, ordinal: u64 },

    #[error("Envelope declared {declared_bytes} bytes and {declared_handles} handles but its content used {used_bytes} bytes and {used_handles} handles")]
    EnvelopeMismatch {
        declared_bytes:   u32,
        declared_handles: u32,
        used_bytes:       usize,
        used_handles:     usize,
    },

    #[error("Envelope size {0} is not a multiple of 8")]
    MisalignedEnvelope(u32),

    #[error("{0} bytes left over after decoding")]
    ExtraBytes(usize),

    #[error("{0} handles left over after decoding")]
    ExtraHandles(usize),

    #[error("Out-of-line nesting exceeds the maximum depth of {0}")]
    MaxDepthExceeded(usize),

    #[error("Invalid message magic number {0}")]
    InvalidMagic(u8),

    #[error("Protocol {protocol} has no method with ordinal {ordinal:#x}")]
    UnknownOrdinal { protocol: &'static str, ordinal: u64 },

    #[error("Expected a reply with ordinal {expected:#x}, got {actual:#x}")]
    UnexpectedOrdinal { expected: u64, actual: u64 },

    #[error("Expected a reply to transaction {expected}, got {actual}")]
    UnexpectedTxid { expected: u32, actual: u32 },

    #[error("Peer closed the transport")]
    PeerClosed,

    #[error("Could not connect to {service}/{member}: {reason}")]
    ConnectFailed {
        service: String,
        member:  String,
        reason:  String,
    },
}
