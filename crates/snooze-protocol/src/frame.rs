//! VarInt framing and primitive field encoding
//!
//! Every packet on the wire is laid out as:
//! - length: VarInt, byte length of everything that follows
//! - packet_id: VarInt
//! - body: packet specific fields
//!
//! Numbers are big-endian, strings are a VarInt byte length followed by UTF-8.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// A VarInt never takes more than five bytes
pub const MAX_VARINT_LEN: usize = 5;

/// Largest length a vanilla server accepts (fits a 3 byte VarInt)
pub const MAX_PACKET_SIZE: usize = 0x1F_FFFF;

/// Read a VarInt from the front of `src` without consuming it.
///
/// Returns the value and its encoded length, or `None` when the buffer ends
/// before the VarInt does.
pub fn peek_varint(src: &[u8]) -> Result<Option<(i32, usize)>, ProtocolError> {
    let mut value: u32 = 0;
    for (i, byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value as i32, i + 1)));
        }
    }

    if src.len() >= MAX_VARINT_LEN {
        Err(ProtocolError::VarIntTooLong)
    } else {
        Ok(None)
    }
}

/// Consume a VarInt from a complete packet body
pub fn get_varint(src: &mut impl Buf) -> Result<i32, ProtocolError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        ensure(src.remaining(), 1)?;
        let byte = src.get_u8();
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Append a VarInt
pub fn put_varint(dst: &mut impl BufMut, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            dst.put_u8(value as u8);
            return;
        }
        dst.put_u8((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

/// Number of bytes `value` takes as a VarInt
pub fn varint_len(value: i32) -> usize {
    let mut value = value as u32;
    let mut len = 1;
    while value & !0x7F != 0 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Consume a length-prefixed UTF-8 string of at most `max_chars` characters
pub fn get_string(src: &mut impl Buf, max_chars: usize) -> Result<String, ProtocolError> {
    let len = get_varint(src)?;
    let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;

    // A character is at most 3 bytes in the modified UTF-8 the game uses
    let max_bytes = max_chars * 3 + 3;
    if len > max_bytes {
        return Err(ProtocolError::StringTooLong { len, max: max_bytes });
    }
    ensure(src.remaining(), len)?;

    let mut raw = vec![0u8; len];
    src.copy_to_slice(&mut raw);
    let value = String::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;

    let chars = value.chars().count();
    if chars > max_chars {
        return Err(ProtocolError::StringTooLong {
            len: chars,
            max: max_chars,
        });
    }
    Ok(value)
}

/// Append a length-prefixed UTF-8 string
pub fn put_string(dst: &mut impl BufMut, value: &str) {
    put_varint(dst, value.len() as i32);
    dst.put_slice(value.as_bytes());
}

/// Consume a big-endian u16
pub fn get_u16(src: &mut impl Buf) -> Result<u16, ProtocolError> {
    ensure(src.remaining(), 2)?;
    Ok(src.get_u16())
}

/// Consume a big-endian i64
pub fn get_i64(src: &mut impl Buf) -> Result<i64, ProtocolError> {
    ensure(src.remaining(), 8)?;
    Ok(src.get_i64())
}

fn ensure(remaining: usize, len: usize) -> Result<(), ProtocolError> {
    if remaining < len {
        return Err(ProtocolError::Truncated {
            needed: len - remaining,
        });
    }
    Ok(())
}
