//! Protocol error types

use thiserror::Error;

use crate::packet::ConnectionState;

/// Errors that can occur while decoding or encoding handshake traffic
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// VarInt ran past its five byte limit
    #[error("VarInt is longer than 5 bytes")]
    VarIntTooLong,

    /// Declared packet length is negative or over the limit
    #[error("Packet too large: {size} bytes exceeds maximum of {max} bytes")]
    PacketTooLarge { size: usize, max: usize },

    /// Packet body ended before a field was complete
    #[error("Packet truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    /// Length prefix is negative
    #[error("Negative length prefix: {0}")]
    NegativeLength(i32),

    /// String field over its protocol limit
    #[error("String too long: {len} bytes exceeds maximum of {max} bytes")]
    StringTooLong { len: usize, max: usize },

    /// String field is not valid UTF-8
    #[error("String is not valid UTF-8")]
    InvalidUtf8,

    /// Packet id not expected in the current state
    #[error("Unexpected packet 0x{id:02x} in {state:?} state")]
    UnexpectedPacket { state: ConnectionState, id: i32 },

    /// Handshake asked for a state we do not serve
    #[error("Unsupported next state: {0}")]
    UnsupportedNextState(i32),

    /// Pre-netty server list ping (0xFE), which we do not answer
    #[error("Legacy server list ping")]
    LegacyPing,

    /// JSON error while building a status or chat payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
