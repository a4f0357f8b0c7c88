//! Tokio codecs for handshake traffic
//!
//! `HandshakeCodec` is the decoy's side of a connection: it decodes what a
//! game client sends and encodes the answers. `ClientCodec` is the mirror
//! image, used to talk to a decoy the way a game client would.
//!
//! Both track the connection state, which changes when a handshake passes
//! through them.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{get_varint, peek_varint, put_varint, varint_len, MAX_PACKET_SIZE};
use crate::packet::{Clientbound, ConnectionState, Serverbound};

/// First byte of a pre-1.7 server list ping
const LEGACY_PING: u8 = 0xFE;

/// Split one length-prefixed frame off `src`, returning id and body
fn decode_frame(
    src: &mut BytesMut,
    max_packet_size: usize,
) -> Result<Option<(i32, Bytes)>, ProtocolError> {
    let (length, header_len) = match peek_varint(src)? {
        Some(v) => v,
        None => return Ok(None), // Need more data
    };

    let length = usize::try_from(length).map_err(|_| ProtocolError::NegativeLength(length))?;
    if length > max_packet_size {
        return Err(ProtocolError::PacketTooLarge {
            size: length,
            max: max_packet_size,
        });
    }

    if src.len() < header_len + length {
        src.reserve(header_len + length - src.len());
        return Ok(None);
    }

    src.advance(header_len);
    let mut body = src.split_to(length).freeze();
    let id = get_varint(&mut body)?;
    Ok(Some((id, body)))
}

/// Write `id` + `body` with its length prefix
fn encode_frame(
    id: i32,
    body: &[u8],
    max_packet_size: usize,
    dst: &mut BytesMut,
) -> Result<(), ProtocolError> {
    let length = varint_len(id) + body.len();
    if length > max_packet_size {
        return Err(ProtocolError::PacketTooLarge {
            size: length,
            max: max_packet_size,
        });
    }

    dst.reserve(varint_len(length as i32) + length);
    put_varint(dst, length as i32);
    put_varint(dst, id);
    dst.extend_from_slice(body);
    Ok(())
}

/// Server side codec: decodes `Serverbound`, encodes `Clientbound`
#[derive(Debug)]
pub struct HandshakeCodec {
    /// Current protocol state
    state: ConnectionState,
    /// Largest frame accepted in either direction
    max_packet_size: usize,
}

impl HandshakeCodec {
    /// Create a codec waiting for a handshake
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Handshaking,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }

    /// Lower the frame size limit
    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    /// Current protocol state
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Default for HandshakeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for HandshakeCodec {
    type Item = Serverbound;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.state == ConnectionState::Handshaking && src.first() == Some(&LEGACY_PING) {
            return Err(ProtocolError::LegacyPing);
        }

        let (id, mut body) = match decode_frame(src, self.max_packet_size)? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let packet = Serverbound::decode(self.state, id, &mut body)?;
        if let Serverbound::Handshake(handshake) = &packet {
            self.state = handshake.next_state.into();
            tracing::trace!(
                "Handshake from protocol {} for {}:{}, switching to {:?}",
                handshake.protocol_version,
                handshake.server_address,
                handshake.server_port,
                self.state
            );
        }

        Ok(Some(packet))
    }
}

impl Encoder<Clientbound> for HandshakeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Clientbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        packet.encode_body(&mut body)?;
        encode_frame(packet.packet_id(), &body, self.max_packet_size, dst)
    }
}

/// Client side codec: encodes `Serverbound`, decodes `Clientbound`
#[derive(Debug)]
pub struct ClientCodec {
    state: ConnectionState,
}

impl ClientCodec {
    /// Create a codec that has not sent its handshake yet
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Handshaking,
        }
    }

    /// Current protocol state
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ClientCodec {
    type Item = Clientbound;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match decode_frame(src, MAX_PACKET_SIZE)? {
            Some((id, mut body)) => Ok(Some(Clientbound::decode(self.state, id, &mut body)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Serverbound> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Serverbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        packet.encode_body(&mut body);
        encode_frame(packet.packet_id(), &body, MAX_PACKET_SIZE, dst)?;

        if let Serverbound::Handshake(handshake) = &packet {
            self.state = handshake.next_state.into();
        }
        Ok(())
    }
}
