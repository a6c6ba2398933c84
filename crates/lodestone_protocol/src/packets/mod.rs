//! The packet registry: `(state, direction, id)` to typed packet.
//!
//! Identifiers are local to a `(state, direction)` pair. The descriptor
//! tables below are the single source of truth; decode dispatch consults
//! them first, so an id the table does not carry is reported as unknown
//! (skipped by the connection) rather than mis-parsed.

pub mod handshake;
pub mod login;
pub mod play;
pub mod status;

use lodestone_pool::{BufferPool, PooledBuf};

pub use handshake::Handshake;
pub use login::{
    EncryptionRequest, EncryptionResponse, LoginDisconnect, LoginStart, LoginSuccess,
    SetCompression,
};
pub use status::{Ping, Pong, StatusPayload, StatusResponse};

use crate::buffer::{ReadBuf, WriteBuf};
use crate::error::CodecError;
use play::*;

/// Which subset of packet ids is valid right now for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    Handshaking,
    Status,
    Login,
    Play,
    /// Terminal; no packet is valid.
    Closed,
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Status => write!(f, "Status"),
            Self::Login => write!(f, "Login"),
            Self::Play => write!(f, "Play"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

/// One registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub state:     ProtocolState,
    pub direction: Direction,
    pub id:        i32,
    pub name:      &'static str,
}

const fn desc(
    state: ProtocolState,
    direction: Direction,
    id: i32,
    name: &'static str,
) -> PacketDescriptor {
    PacketDescriptor {
        state,
        direction,
        id,
        name,
    }
}

use Direction::{Clientbound, Serverbound};
use ProtocolState::{Handshaking, Login, Play, Status};

static HANDSHAKING_SERVERBOUND: &[PacketDescriptor] =
    &[desc(Handshaking, Serverbound, 0x00, "Handshake")];

static STATUS_SERVERBOUND: &[PacketDescriptor] = &[
    desc(Status, Serverbound, 0x00, "StatusRequest"),
    desc(Status, Serverbound, 0x01, "Ping"),
];

static STATUS_CLIENTBOUND: &[PacketDescriptor] = &[
    desc(Status, Clientbound, 0x00, "StatusResponse"),
    desc(Status, Clientbound, 0x01, "Pong"),
];

static LOGIN_SERVERBOUND: &[PacketDescriptor] = &[
    desc(Login, Serverbound, 0x00, "LoginStart"),
    desc(Login, Serverbound, 0x01, "EncryptionResponse"),
];

static LOGIN_CLIENTBOUND: &[PacketDescriptor] = &[
    desc(Login, Clientbound, 0x00, "LoginDisconnect"),
    desc(Login, Clientbound, 0x01, "EncryptionRequest"),
    desc(Login, Clientbound, 0x02, "LoginSuccess"),
    desc(Login, Clientbound, 0x03, "SetCompression"),
];

static PLAY_SERVERBOUND: &[PacketDescriptor] = &[
    desc(Play, Serverbound, 0x00, "TeleportConfirm"),
    desc(Play, Serverbound, 0x03, "ChatMessage"),
    desc(Play, Serverbound, 0x04, "ClientStatus"),
    desc(Play, Serverbound, 0x05, "ClientSettings"),
    desc(Play, Serverbound, 0x0B, "PluginMessage"),
    desc(Play, Serverbound, 0x10, "KeepAlive"),
    desc(Play, Serverbound, 0x12, "PlayerPosition"),
    desc(Play, Serverbound, 0x13, "PlayerPositionAndRotation"),
    desc(Play, Serverbound, 0x14, "PlayerRotation"),
    desc(Play, Serverbound, 0x15, "PlayerMovement"),
    desc(Play, Serverbound, 0x1A, "PlayerAbilities"),
    desc(Play, Serverbound, 0x1B, "PlayerDigging"),
    desc(Play, Serverbound, 0x1C, "EntityAction"),
    desc(Play, Serverbound, 0x25, "HeldItemChange"),
    desc(Play, Serverbound, 0x28, "CreativeInventoryAction"),
    desc(Play, Serverbound, 0x2B, "UpdateSign"),
    desc(Play, Serverbound, 0x2C, "Animation"),
    desc(Play, Serverbound, 0x2E, "PlayerBlockPlacement"),
    desc(Play, Serverbound, 0x2F, "UseItem"),
];

static PLAY_CLIENTBOUND: &[PacketDescriptor] = &[
    desc(Play, Clientbound, 0x04, "SpawnPlayer"),
    desc(Play, Clientbound, 0x0B, "BlockChange"),
    desc(Play, Clientbound, 0x0C, "BossBar"),
    desc(Play, Clientbound, 0x0E, "ChatMessage"),
    desc(Play, Clientbound, 0x10, "DeclareCommands"),
    desc(Play, Clientbound, 0x13, "WindowItems"),
    desc(Play, Clientbound, 0x15, "SetSlot"),
    desc(Play, Clientbound, 0x19, "Disconnect"),
    desc(Play, Clientbound, 0x1C, "UnloadChunk"),
    desc(Play, Clientbound, 0x1F, "KeepAlive"),
    desc(Play, Clientbound, 0x20, "ChunkData"),
    desc(Play, Clientbound, 0x22, "Particle"),
    desc(Play, Clientbound, 0x24, "JoinGame"),
    desc(Play, Clientbound, 0x32, "PlayerInfo"),
    desc(Play, Clientbound, 0x34, "PlayerPositionAndLook"),
    desc(Play, Clientbound, 0x3F, "HeldItemChange"),
    desc(Play, Clientbound, 0x40, "UpdateViewPosition"),
    desc(Play, Clientbound, 0x42, "SpawnPosition"),
    desc(Play, Clientbound, 0x44, "EntityMetadata"),
    desc(Play, Clientbound, 0x46, "EntityVelocity"),
    desc(Play, Clientbound, 0x4E, "TimeUpdate"),
    desc(Play, Clientbound, 0x57, "DeclareRecipes"),
];

fn table(state: ProtocolState, direction: Direction) -> &'static [PacketDescriptor] {
    match (state, direction) {
        (Handshaking, Serverbound) => HANDSHAKING_SERVERBOUND,
        (Status, Serverbound) => STATUS_SERVERBOUND,
        (Status, Clientbound) => STATUS_CLIENTBOUND,
        (Login, Serverbound) => LOGIN_SERVERBOUND,
        (Login, Clientbound) => LOGIN_CLIENTBOUND,
        (Play, Serverbound) => PLAY_SERVERBOUND,
        (Play, Clientbound) => PLAY_CLIENTBOUND,
        _ => &[],
    }
}

/// Look up one registry row. `None` means the id is deliberately absent
/// for this `(state, direction)`.
pub fn lookup(state: ProtocolState, direction: Direction, id: i32) -> Option<&'static PacketDescriptor> {
    table(state, direction).iter().find(|d| d.id == id)
}

/// Every populated registry row, for enumeration tests and tooling.
pub fn descriptors() -> impl Iterator<Item = &'static PacketDescriptor> {
    [
        HANDSHAKING_SERVERBOUND,
        STATUS_SERVERBOUND,
        STATUS_CLIENTBOUND,
        LOGIN_SERVERBOUND,
        LOGIN_CLIENTBOUND,
        PLAY_SERVERBOUND,
        PLAY_CLIENTBOUND,
    ]
    .into_iter()
    .flatten()
}

/// Every inbound packet the engine understands, one variant per registry
/// row with `Serverbound` direction.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPacket {
    Handshake(Handshake),

    StatusRequest,
    Ping(Ping),

    LoginStart(LoginStart),
    EncryptionResponse(EncryptionResponse),

    TeleportConfirm(TeleportConfirm),
    ChatMessage(play::ChatMessage),
    ClientStatus(ClientStatus),
    ClientSettings(ClientSettings),
    PluginMessage(PluginMessage),
    KeepAlive(KeepAliveServerbound),
    PlayerPosition(PlayerPosition),
    PlayerPositionAndRotation(PlayerPositionAndRotation),
    PlayerRotation(PlayerRotation),
    PlayerMovement(PlayerMovement),
    PlayerAbilities(PlayerAbilities),
    PlayerDigging(PlayerDigging),
    EntityAction(EntityAction),
    HeldItemChange(HeldItemChangeServerbound),
    CreativeInventoryAction(CreativeInventoryAction),
    UpdateSign(UpdateSign),
    Animation(Animation),
    PlayerBlockPlacement(PlayerBlockPlacement),
    UseItem(UseItem),
}

impl ServerboundPacket {
    /// Decode one frame body: id varint, then fields.
    ///
    /// `Ok(None)` is an id the registry does not carry for this state; the
    /// cursor is advanced past the frame so the caller can log and move
    /// on. A known id must consume the frame exactly; trailing bytes are
    /// malformed.
    pub fn decode_frame(
        state: ProtocolState,
        r: &mut ReadBuf<'_>,
    ) -> Result<Option<(i32, Self)>, CodecError> {
        let id = r.read_varint()?;

        if lookup(state, Direction::Serverbound, id).is_none() {
            r.skip_to_end();
            return Ok(None);
        }

        let packet = Self::decode_known(state, id, r)?;

        if !r.is_empty() {
            return Err(CodecError::Malformed("trailing bytes after packet"));
        }

        Ok(Some((id, packet)))
    }

    fn decode_known(
        state: ProtocolState,
        id: i32,
        r: &mut ReadBuf<'_>,
    ) -> Result<Self, CodecError> {
        let packet = match (state, id) {
            (Handshaking, 0x00) => Self::Handshake(Handshake::decode(r)?),

            (Status, 0x00) => Self::StatusRequest,
            (Status, 0x01) => Self::Ping(Ping::decode(r)?),

            (Login, 0x00) => Self::LoginStart(LoginStart::decode(r)?),
            (Login, 0x01) => Self::EncryptionResponse(EncryptionResponse::decode(r)?),

            (Play, 0x00) => Self::TeleportConfirm(TeleportConfirm::decode(r)?),
            (Play, 0x03) => Self::ChatMessage(play::ChatMessage::decode(r)?),
            (Play, 0x04) => Self::ClientStatus(ClientStatus::decode(r)?),
            (Play, 0x05) => Self::ClientSettings(ClientSettings::decode(r)?),
            (Play, 0x0B) => Self::PluginMessage(PluginMessage::decode(r)?),
            (Play, 0x10) => Self::KeepAlive(KeepAliveServerbound::decode(r)?),
            (Play, 0x12) => Self::PlayerPosition(PlayerPosition::decode(r)?),
            (Play, 0x13) => {
                Self::PlayerPositionAndRotation(PlayerPositionAndRotation::decode(r)?)
            }
            (Play, 0x14) => Self::PlayerRotation(PlayerRotation::decode(r)?),
            (Play, 0x15) => Self::PlayerMovement(PlayerMovement::decode(r)?),
            (Play, 0x1A) => Self::PlayerAbilities(PlayerAbilities::decode(r)?),
            (Play, 0x1B) => Self::PlayerDigging(PlayerDigging::decode(r)?),
            (Play, 0x1C) => Self::EntityAction(EntityAction::decode(r)?),
            (Play, 0x25) => Self::HeldItemChange(HeldItemChangeServerbound::decode(r)?),
            (Play, 0x28) => Self::CreativeInventoryAction(CreativeInventoryAction::decode(r)?),
            (Play, 0x2B) => Self::UpdateSign(UpdateSign::decode(r)?),
            (Play, 0x2C) => Self::Animation(Animation::decode(r)?),
            (Play, 0x2E) => Self::PlayerBlockPlacement(PlayerBlockPlacement::decode(r)?),
            (Play, 0x2F) => Self::UseItem(UseItem::decode(r)?),

            // lookup() succeeded, so this row exists; reaching here means
            // the decode table drifted from the descriptor table.
            _ => return Err(CodecError::Malformed("registry drift")),
        };
        Ok(packet)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "Handshake",
            Self::StatusRequest => "StatusRequest",
            Self::Ping(_) => "Ping",
            Self::LoginStart(_) => "LoginStart",
            Self::EncryptionResponse(_) => "EncryptionResponse",
            Self::TeleportConfirm(_) => "TeleportConfirm",
            Self::ChatMessage(_) => "ChatMessage",
            Self::ClientStatus(_) => "ClientStatus",
            Self::ClientSettings(_) => "ClientSettings",
            Self::PluginMessage(_) => "PluginMessage",
            Self::KeepAlive(_) => "KeepAlive",
            Self::PlayerPosition(_) => "PlayerPosition",
            Self::PlayerPositionAndRotation(_) => "PlayerPositionAndRotation",
            Self::PlayerRotation(_) => "PlayerRotation",
            Self::PlayerMovement(_) => "PlayerMovement",
            Self::PlayerAbilities(_) => "PlayerAbilities",
            Self::PlayerDigging(_) => "PlayerDigging",
            Self::EntityAction(_) => "EntityAction",
            Self::HeldItemChange(_) => "HeldItemChange",
            Self::CreativeInventoryAction(_) => "CreativeInventoryAction",
            Self::UpdateSign(_) => "UpdateSign",
            Self::Animation(_) => "Animation",
            Self::PlayerBlockPlacement(_) => "PlayerBlockPlacement",
            Self::UseItem(_) => "UseItem",
        }
    }
}

/// Every outbound packet, one variant per registry row with `Clientbound`
/// direction.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundPacket {
    StatusResponse(StatusResponse),
    Pong(Pong),

    LoginDisconnect(LoginDisconnect),
    EncryptionRequest(EncryptionRequest),
    LoginSuccess(LoginSuccess),
    SetCompression(SetCompression),

    SpawnPlayer(SpawnPlayer),
    BlockChange(BlockChange),
    BossBar(BossBar),
    ChatMessage(ChatMessageClientbound),
    DeclareCommands(DeclareCommands),
    WindowItems(WindowItems),
    SetSlot(SetSlot),
    Disconnect(Disconnect),
    UnloadChunk(UnloadChunk),
    KeepAlive(KeepAliveClientbound),
    ChunkData(ChunkData),
    Particle(Particle),
    JoinGame(Box<JoinGame>),
    PlayerInfo(PlayerInfo),
    PlayerPositionAndLook(PlayerPositionAndLook),
    HeldItemChange(HeldItemChangeClientbound),
    UpdateViewPosition(UpdateViewPosition),
    SpawnPosition(SpawnPosition),
    EntityMetadata(EntityMetadataPacket),
    EntityVelocity(EntityVelocity),
    TimeUpdate(TimeUpdate),
    DeclareRecipes(DeclareRecipes),
}

impl ClientboundPacket {
    pub fn state(&self) -> ProtocolState {
        match self {
            Self::StatusResponse(_) | Self::Pong(_) => Status,
            Self::LoginDisconnect(_)
            | Self::EncryptionRequest(_)
            | Self::LoginSuccess(_)
            | Self::SetCompression(_) => Login,
            _ => Play,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::StatusResponse(_) => 0x00,
            Self::Pong(_) => 0x01,

            Self::LoginDisconnect(_) => 0x00,
            Self::EncryptionRequest(_) => 0x01,
            Self::LoginSuccess(_) => 0x02,
            Self::SetCompression(_) => 0x03,

            Self::SpawnPlayer(_) => 0x04,
            Self::BlockChange(_) => 0x0B,
            Self::BossBar(_) => 0x0C,
            Self::ChatMessage(_) => 0x0E,
            Self::DeclareCommands(_) => 0x10,
            Self::WindowItems(_) => 0x13,
            Self::SetSlot(_) => 0x15,
            Self::Disconnect(_) => 0x19,
            Self::UnloadChunk(_) => 0x1C,
            Self::KeepAlive(_) => 0x1F,
            Self::ChunkData(_) => 0x20,
            Self::Particle(_) => 0x22,
            Self::JoinGame(_) => 0x24,
            Self::PlayerInfo(_) => 0x32,
            Self::PlayerPositionAndLook(_) => 0x34,
            Self::HeldItemChange(_) => 0x3F,
            Self::UpdateViewPosition(_) => 0x40,
            Self::SpawnPosition(_) => 0x42,
            Self::EntityMetadata(_) => 0x44,
            Self::EntityVelocity(_) => 0x46,
            Self::TimeUpdate(_) => 0x4E,
            Self::DeclareRecipes(_) => 0x57,
        }
    }

    pub fn name(&self) -> &'static str {
        // The descriptor row always exists; id()/state() are derived from
        // the same table this enum mirrors.
        lookup(self.state(), Direction::Clientbound, self.id())
            .map_or("Unknown", |d| d.name)
    }

    /// Bulk world traffic the outbound queue may drop under pressure.
    /// Chat, keep-alive and disconnect are never in this class.
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            Self::ChunkData(_)
                | Self::UnloadChunk(_)
                | Self::UpdateViewPosition(_)
                | Self::BlockChange(_)
                | Self::Particle(_)
                | Self::TimeUpdate(_)
                | Self::EntityMetadata(_)
                | Self::EntityVelocity(_)
        )
    }

    /// Encode the fields (no id, no framing) into `w`.
    pub fn encode_fields(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        match self {
            Self::StatusResponse(p) => p.encode(w)?,
            Self::Pong(p) => p.encode(w),

            Self::LoginDisconnect(p) => p.encode(w)?,
            Self::EncryptionRequest(p) => p.encode(w)?,
            Self::LoginSuccess(p) => p.encode(w)?,
            Self::SetCompression(p) => p.encode(w),

            Self::SpawnPlayer(p) => p.encode(w),
            Self::BlockChange(p) => p.encode(w),
            Self::BossBar(p) => p.encode(w)?,
            Self::ChatMessage(p) => p.encode(w)?,
            Self::DeclareCommands(p) => p.encode(w)?,
            Self::WindowItems(p) => p.encode(w),
            Self::SetSlot(p) => p.encode(w),
            Self::Disconnect(p) => p.encode(w)?,
            Self::UnloadChunk(p) => p.encode(w),
            Self::KeepAlive(p) => p.encode(w),
            Self::ChunkData(p) => p.encode(w),
            Self::Particle(p) => p.encode(w),
            Self::JoinGame(p) => p.encode(w)?,
            Self::PlayerInfo(p) => p.encode(w)?,
            Self::PlayerPositionAndLook(p) => p.encode(w),
            Self::HeldItemChange(p) => p.encode(w),
            Self::UpdateViewPosition(p) => p.encode(w),
            Self::SpawnPosition(p) => p.encode(w),
            Self::EntityMetadata(p) => p.encode(w)?,
            Self::EntityVelocity(p) => p.encode(w),
            Self::TimeUpdate(p) => p.encode(w),
            Self::DeclareRecipes(p) => p.encode(w)?,
        }
        Ok(())
    }

    /// The pure encode path: id varint plus fields, ready for framing.
    /// Usable without any connection, which is how the tests serialise
    /// packets.
    pub fn encode_body(&self, pool: &BufferPool) -> Result<PooledBuf, CodecError> {
        let mut w = WriteBuf::new(pool);
        w.write_varint(self.id());
        self.encode_fields(&mut w)?;
        Ok(w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chat;

    #[test]
    fn test_registry_matches_pinned_reference() {
        let ids = |state, direction| -> Vec<i32> {
            table(state, direction).iter().map(|d| d.id).collect()
        };

        assert_eq!(ids(Handshaking, Serverbound), [0x00]);
        assert_eq!(ids(Status, Serverbound), [0x00, 0x01]);
        assert_eq!(ids(Status, Clientbound), [0x00, 0x01]);
        assert_eq!(ids(Login, Serverbound), [0x00, 0x01]);
        assert_eq!(ids(Login, Clientbound), [0x00, 0x01, 0x02, 0x03]);

        assert_eq!(
            ids(Play, Serverbound),
            [
                0x00, 0x03, 0x04, 0x05, 0x0B, 0x10, 0x12, 0x13, 0x14, 0x15, 0x1A, 0x1B, 0x1C,
                0x25, 0x28, 0x2B, 0x2C, 0x2E, 0x2F
            ]
        );
        assert_eq!(
            ids(Play, Clientbound),
            [
                0x04, 0x0B, 0x0C, 0x0E, 0x10, 0x13, 0x15, 0x19, 0x1C, 0x1F, 0x20, 0x22, 0x24,
                0x32, 0x34, 0x3F, 0x40, 0x42, 0x44, 0x46, 0x4E, 0x57
            ]
        );
    }

    #[test]
    fn test_ids_unique_per_state_and_direction() {
        for state in [Handshaking, Status, Login, Play, ProtocolState::Closed] {
            for direction in [Serverbound, Clientbound] {
                let rows = table(state, direction);
                for (i, row) in rows.iter().enumerate() {
                    assert!(
                        rows[i + 1..].iter().all(|other| other.id != row.id),
                        "duplicate id {:#04x} in {state}/{direction:?}",
                        row.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_closed_state_has_no_packets() {
        assert!(table(ProtocolState::Closed, Serverbound).is_empty());
        assert!(table(ProtocolState::Closed, Clientbound).is_empty());
    }

    #[test]
    fn test_state_invalid_id_is_unknown() {
        // LoginStart's id is only valid in Login; in Play 0x00 is
        // TeleportConfirm, and Handshake's body would not decode there.
        let pool = BufferPool::new();
        let mut w = WriteBuf::new(&pool);
        w.write_varint(0x01); // Ping id, valid in Status only
        w.write_i64(99);

        let mut r = ReadBuf::new(w.as_slice());
        let decoded = ServerboundPacket::decode_frame(ProtocolState::Handshaking, &mut r).unwrap();
        assert!(decoded.is_none());
        assert!(r.is_empty(), "unknown ids must skip the whole frame");
    }

    #[test]
    fn test_trailing_bytes_are_malformed() {
        let pool = BufferPool::new();
        let mut w = WriteBuf::new(&pool);
        w.write_varint(0x10); // Play KeepAlive
        w.write_i64(7);
        w.write_u8(0xEE); // stray byte

        let mut r = ReadBuf::new(w.as_slice());
        assert!(matches!(
            ServerboundPacket::decode_frame(ProtocolState::Play, &mut r),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_known_play_packet() {
        let pool = BufferPool::new();
        let mut w = WriteBuf::new(&pool);
        w.write_varint(0x10);
        w.write_i64(0x55AA);

        let mut r = ReadBuf::new(w.as_slice());
        let (id, packet) = ServerboundPacket::decode_frame(ProtocolState::Play, &mut r)
            .unwrap()
            .unwrap();
        assert_eq!(id, 0x10);
        assert_eq!(
            packet,
            ServerboundPacket::KeepAlive(KeepAliveServerbound { id: 0x55AA })
        );
    }

    #[test]
    fn test_every_serverbound_descriptor_has_a_decoder() {
        // Feed an empty body to each registered id; anything that errors
        // must fail with a codec error, never the registry-drift marker.
        for row in descriptors().filter(|d| d.direction == Serverbound) {
            let mut r = ReadBuf::new(&[]);
            match ServerboundPacket::decode_known(row.state, row.id, &mut r) {
                Ok(_) => {}
                Err(CodecError::Malformed(msg)) => {
                    assert_ne!(msg, "registry drift", "{} has no decode arm", row.name);
                }
                Err(_) => {}
            }
        }
    }

    #[test]
    fn test_encode_body_is_pure() {
        let pool = BufferPool::new();
        let packet = ClientboundPacket::Disconnect(Disconnect {
            reason: Chat::text("bye"),
        });
        let body = packet.encode_body(&pool).unwrap();
        assert_eq!(body[0], 0x19);

        let mut r = ReadBuf::new(&body[1..]);
        assert_eq!(Chat::read(&mut r).unwrap(), Chat::text("bye"));
    }

    #[test]
    fn test_lossy_classes() {
        let keep_alive = ClientboundPacket::KeepAlive(KeepAliveClientbound { id: 1 });
        let chat = ClientboundPacket::ChatMessage(ChatMessageClientbound {
            message:  Chat::text("hi"),
            position: 0,
            sender:   uuid::Uuid::nil(),
        });
        let disconnect = ClientboundPacket::Disconnect(Disconnect {
            reason: Chat::text("bye"),
        });
        let view = ClientboundPacket::UpdateViewPosition(UpdateViewPosition {
            chunk_x: 0,
            chunk_z: 0,
        });

        assert!(!keep_alive.is_lossy());
        assert!(!chat.is_lossy());
        assert!(!disconnect.is_lossy());
        assert!(view.is_lossy());
    }

    #[test]
    fn test_clientbound_names_resolve() {
        let pong = ClientboundPacket::Pong(Pong { payload: 0 });
        assert_eq!(pong.name(), "Pong");
        let join = ClientboundPacket::SpawnPosition(SpawnPosition {
            position: crate::types::Position::new(0, 64, 0),
        });
        assert_eq!(join.name(), "SpawnPosition");
    }
}
