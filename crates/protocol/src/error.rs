//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding or parsing packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid packet opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("Malformed string")]
    MalformedString,

    #[error("Payload of {len} bytes does not fit a {size:?} frame")]
    PayloadTooLarge { len: usize, size: crate::PacketSize },

    #[error("Fixed-size packet {opcode} expected {expected} bytes, got {actual}")]
    SizeMismatch {
        opcode: u8,
        expected: usize,
        actual: usize,
    },
}
