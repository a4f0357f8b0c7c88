//! Packet types for the handshake, status and login states
//!
//! Only the packets a decoy needs are modelled. Serverbound packets are what a
//! game client sends us, clientbound packets are what we answer with.
//!
//! # Packet Flow
//!
//! Server list ping:
//!
//! 1. Client sends `Handshake` with next state `Status`
//! 2. Client sends `StatusRequest`, decoy answers `StatusResponse`
//! 3. Client sends `Ping`, decoy answers `Pong` and the connection ends
//!
//! Join attempt:
//!
//! 1. Client sends `Handshake` with next state `Login`
//! 2. Client sends `LoginStart` with its player name
//! 3. Decoy answers `LoginDisconnect` and closes the connection

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;
use crate::frame::{get_i64, get_string, get_u16, get_varint, put_string, put_varint};
use crate::status::StatusResponse;

/// Longest server address a handshake may carry
pub const MAX_ADDRESS_LEN: usize = 255;

/// Longest player name accepted in `LoginStart`
pub const MAX_PLAYER_NAME_LEN: usize = 16;

/// Longest JSON payload in a status response or chat component
pub const MAX_JSON_LEN: usize = 262_144;

/// Protocol state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the handshake
    Handshaking,
    /// Server list ping
    Status,
    /// Join attempt
    Login,
}

/// State requested by the client in its handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// Server list ping
    Status,
    /// Join attempt
    Login,
    /// Join attempt redirected from another server (1.20.5+)
    Transfer,
}

impl NextState {
    /// Parse the handshake's next state field
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(NextState::Status),
            2 => Some(NextState::Login),
            3 => Some(NextState::Transfer),
            _ => None,
        }
    }

    /// Wire value of this state
    pub fn as_i32(&self) -> i32 {
        match self {
            NextState::Status => 1,
            NextState::Login => 2,
            NextState::Transfer => 3,
        }
    }

    /// Whether the client intends to join rather than ping
    pub fn is_join(&self) -> bool {
        matches!(self, NextState::Login | NextState::Transfer)
    }
}

impl From<NextState> for ConnectionState {
    fn from(next: NextState) -> Self {
        match next {
            NextState::Status => ConnectionState::Status,
            NextState::Login | NextState::Transfer => ConnectionState::Login,
        }
    }
}

/// First packet of every connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol number of the client
    pub protocol_version: i32,
    /// Host name the client typed in
    pub server_address: String,
    /// Port the client connected to
    pub server_port: u16,
    /// State to switch to
    pub next_state: NextState,
}

/// Packets sent by a game client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Serverbound {
    /// Connection intent
    Handshake(Handshake),
    /// Ask for the server list entry
    StatusRequest,
    /// Latency check, echoed back verbatim
    Ping { payload: i64 },
    /// Begin logging in as `name`
    LoginStart { name: String },
}

impl Serverbound {
    /// Packet id on the wire
    pub fn packet_id(&self) -> i32 {
        match self {
            Serverbound::Handshake(_) => 0x00,
            Serverbound::StatusRequest => 0x00,
            Serverbound::Ping { .. } => 0x01,
            Serverbound::LoginStart { .. } => 0x00,
        }
    }

    /// Decode a packet body received in `state`.
    ///
    /// Trailing fields we do not care about (signature data, UUIDs) are left
    /// unread; the frame has already been split off so they are discarded.
    pub fn decode(
        state: ConnectionState,
        id: i32,
        body: &mut impl Buf,
    ) -> Result<Self, ProtocolError> {
        match (state, id) {
            (ConnectionState::Handshaking, 0x00) => {
                let protocol_version = get_varint(body)?;
                let server_address = get_string(body, MAX_ADDRESS_LEN)?;
                let server_port = get_u16(body)?;
                let raw_next = get_varint(body)?;
                let next_state = NextState::from_i32(raw_next)
                    .ok_or(ProtocolError::UnsupportedNextState(raw_next))?;
                Ok(Serverbound::Handshake(Handshake {
                    protocol_version,
                    server_address,
                    server_port,
                    next_state,
                }))
            }
            (ConnectionState::Status, 0x00) => Ok(Serverbound::StatusRequest),
            (ConnectionState::Status, 0x01) => Ok(Serverbound::Ping {
                payload: get_i64(body)?,
            }),
            (ConnectionState::Login, 0x00) => Ok(Serverbound::LoginStart {
                name: get_string(body, MAX_PLAYER_NAME_LEN)?,
            }),
            (state, id) => Err(ProtocolError::UnexpectedPacket { state, id }),
        }
    }

    /// Encode the packet body (without id)
    pub fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            Serverbound::Handshake(handshake) => {
                put_varint(dst, handshake.protocol_version);
                put_string(dst, &handshake.server_address);
                dst.extend_from_slice(&handshake.server_port.to_be_bytes());
                put_varint(dst, handshake.next_state.as_i32());
            }
            Serverbound::StatusRequest => {}
            Serverbound::Ping { payload } => dst.extend_from_slice(&payload.to_be_bytes()),
            Serverbound::LoginStart { name } => put_string(dst, name),
        }
    }
}

/// Packets sent by the decoy
#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    /// Server list entry
    StatusResponse(StatusResponse),
    /// Echo of a `Ping`
    Pong { payload: i64 },
    /// Kick during login, `reason` is plain text
    LoginDisconnect { reason: String },
}

impl Clientbound {
    /// Packet id on the wire
    pub fn packet_id(&self) -> i32 {
        match self {
            Clientbound::StatusResponse(_) => 0x00,
            Clientbound::Pong { .. } => 0x01,
            Clientbound::LoginDisconnect { .. } => 0x00,
        }
    }

    /// Encode the packet body (without id)
    pub fn encode_body(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            Clientbound::StatusResponse(status) => {
                put_string(dst, &serde_json::to_string(status)?);
            }
            Clientbound::Pong { payload } => dst.extend_from_slice(&payload.to_be_bytes()),
            Clientbound::LoginDisconnect { reason } => {
                let component = serde_json::json!({ "text": reason });
                put_string(dst, &serde_json::to_string(&component)?);
            }
        }
        Ok(())
    }

    /// Decode a packet body received in `state` (client side)
    pub fn decode(
        state: ConnectionState,
        id: i32,
        body: &mut impl Buf,
    ) -> Result<Self, ProtocolError> {
        match (state, id) {
            (ConnectionState::Status, 0x00) => {
                let json = get_string(body, MAX_JSON_LEN)?;
                Ok(Clientbound::StatusResponse(serde_json::from_str(&json)?))
            }
            (ConnectionState::Status, 0x01) => Ok(Clientbound::Pong {
                payload: get_i64(body)?,
            }),
            (ConnectionState::Login, 0x00) => {
                let json = get_string(body, MAX_JSON_LEN)?;
                Ok(Clientbound::LoginDisconnect {
                    reason: component_text(&json)?,
                })
            }
            (state, id) => Err(ProtocolError::UnexpectedPacket { state, id }),
        }
    }
}

/// Flatten a chat component to its plain text
fn component_text(json: &str) -> Result<String, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Object(map) => map
            .get("text")
            .and_then(|text| text.as_str())
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    })
}
