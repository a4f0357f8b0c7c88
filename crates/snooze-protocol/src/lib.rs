//! snooze-protocol: Minimal Minecraft handshake protocol for decoy listeners
//!
//! A decoy only needs to be discoverable in the server list and to reach the
//! point where a client tries to log in. This crate covers exactly that part
//! of the Java edition protocol: VarInt framing, the handshake, the status
//! exchange (server list ping) and the first login packet, plus the login
//! disconnect used to send the client away.

pub mod codec;
pub mod error;
pub mod frame;
pub mod packet;
pub mod status;

pub use codec::{ClientCodec, HandshakeCodec};
pub use error::ProtocolError;
pub use frame::{MAX_PACKET_SIZE, MAX_VARINT_LEN};
pub use packet::{Clientbound, ConnectionState, Handshake, NextState, Serverbound};
pub use status::StatusResponse;
