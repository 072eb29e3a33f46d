use thiserror::Error;

/// Why a record (or the rest of a datagram) couldn't be decoded.
///
/// None of these are fatal to a listener: the datagram being decoded is dropped
/// and the next one is processed as usual.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated read: needed {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown event type 0x{0:02x} (no payload size registered)")]
    UnknownEventType(u8),

    #[error("malformed data: {0}")]
    Malformed(String),
}
