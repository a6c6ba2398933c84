//! Login-state packets: identity exchange, the optional encryption leg,
//! compression negotiation and the success/refusal pair.

use uuid::Uuid;

use crate::buffer::{ReadBuf, WriteBuf};
use crate::error::CodecError;
use crate::types::Chat;

/// `0x00` serverbound: the client-claimed username.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginStart {
    pub username: String,
}

impl LoginStart {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            username: r.read_string()?,
        })
    }
}

/// `0x01` serverbound: RSA-encrypted shared secret and verify token.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionResponse {
    pub shared_secret: Vec<u8>,
    pub verify_token:  Vec<u8>,
}

impl EncryptionResponse {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            shared_secret: r.read_byte_array()?,
            verify_token:  r.read_byte_array()?,
        })
    }
}

/// `0x00` clientbound: login-phase refusal with a chat reason.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginDisconnect {
    pub reason: Chat,
}

impl LoginDisconnect {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        self.reason.write(w)
    }
}

/// `0x01` clientbound: DER public key plus a fresh verify token.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionRequest {
    pub server_id:    String,
    pub public_key:   Vec<u8>,
    pub verify_token: Vec<u8>,
}

impl EncryptionRequest {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_string(&self.server_id)?;
        w.write_byte_array(&self.public_key);
        w.write_byte_array(&self.verify_token);
        Ok(())
    }
}

/// `0x02` clientbound: profile confirmation; the connection is in Play
/// after this. Protocol 754 carries the UUID raw, not as a string.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSuccess {
    pub uuid:     Uuid,
    pub username: String,
}

impl LoginSuccess {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_uuid(&self.uuid);
        w.write_string(&self.username)
    }
}

/// `0x03` clientbound: the next packet in either direction uses compressed
/// framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompression {
    pub threshold: i32,
}

impl SetCompression {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_varint(self.threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_pool::BufferPool;

    #[test]
    fn test_login_success_wire_form() {
        let pool = BufferPool::new();
        let uuid = Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap();
        let packet = LoginSuccess {
            uuid,
            username: "Notch".to_string(),
        };

        let mut w = WriteBuf::new(&pool);
        packet.encode(&mut w).unwrap();

        // 16 raw UUID bytes, then the name with a 1-byte length prefix.
        assert_eq!(w.len(), 16 + 1 + 5);
        assert_eq!(&w.as_slice()[..16], uuid.as_bytes());
        assert_eq!(&w.as_slice()[17..], b"Notch");
    }

    #[test]
    fn test_encryption_response_decode() {
        let pool = BufferPool::new();
        let mut w = WriteBuf::new(&pool);
        w.write_byte_array(&[1, 2, 3]);
        w.write_byte_array(&[4, 5]);

        let mut r = ReadBuf::new(w.as_slice());
        let packet = EncryptionResponse::decode(&mut r).unwrap();
        assert_eq!(packet.shared_secret, [1, 2, 3]);
        assert_eq!(packet.verify_token, [4, 5]);
    }
}
