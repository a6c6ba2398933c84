//! Handshaking-state packets. There is exactly one.

use crate::buffer::ReadBuf;
use crate::error::CodecError;

/// `0x00` serverbound. The first packet of every session; `next_state`
/// selects Status (1) or Login (2).
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address:   String,
    pub server_port:      u16,
    pub next_state:       i32,
}

impl Handshake {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            protocol_version: r.read_varint()?,
            server_address:   r.read_string()?,
            server_port:      r.read_u16()?,
            next_state:       r.read_varint()?,
        })
    }
}
