//! Status-state packets and the server-list JSON payload.

use serde::Serialize;

use crate::buffer::{ReadBuf, WriteBuf};
use crate::error::CodecError;
use crate::{GAME_VERSION, PROTOCOL_VERSION};

/// `0x01` serverbound: opaque token the client expects echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub payload: i64,
}

impl Ping {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            payload: r.read_i64()?,
        })
    }
}

/// `0x00` clientbound: the server-list JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub json: String,
}

impl StatusResponse {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_string(&self.json)
    }
}

/// `0x01` clientbound: the Ping echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub payload: i64,
}

impl Pong {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i64(self.payload);
    }
}

/// The JSON document behind [`StatusResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub version:     StatusVersion,
    pub players:     StatusPlayers,
    pub description: StatusDescription,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusVersion {
    pub name:     String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPlayers {
    pub max:    u32,
    pub online: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusDescription {
    pub text: String,
}

impl StatusPayload {
    pub fn new(motd: &str, max_players: u32, online: u32) -> Self {
        Self {
            version:     StatusVersion {
                name:     GAME_VERSION.to_string(),
                protocol: PROTOCOL_VERSION,
            },
            players:     StatusPlayers {
                max:    max_players,
                online,
            },
            description: StatusDescription {
                text: motd.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        // Serialization of a plain struct with string/number leaves cannot
        // fail; fall back to an empty object just in case.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json_shape() {
        let payload = StatusPayload::new("Hello", 20, 3);
        let value: serde_json::Value = serde_json::from_str(&payload.to_json()).unwrap();

        assert_eq!(value["version"]["protocol"], PROTOCOL_VERSION);
        assert_eq!(value["version"]["name"], GAME_VERSION);
        assert_eq!(value["players"]["max"], 20);
        assert_eq!(value["players"]["online"], 3);
        assert_eq!(value["description"]["text"], "Hello");
    }

    #[test]
    fn test_ping_decode() {
        let bytes = 0x1122334455667788i64.to_be_bytes();
        let mut r = ReadBuf::new(&bytes);
        assert_eq!(Ping::decode(&mut r).unwrap().payload, 0x1122334455667788);
    }
}
