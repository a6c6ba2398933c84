//! Play-state packets, protocol 754.
//!
//! Serverbound ids without a typed decoder here are deliberately absent
//! from the registry; well-formed frames carrying them are skipped.

use uuid::Uuid;

use crate::buffer::{ReadBuf, WriteBuf};
use crate::error::CodecError;
use crate::nbt::{self, Tag};
use crate::types::{
    Angle, BossBarAction, Chat, CommandNode, DimensionCodec, DimensionType, EntityMetadata,
    ItemStack, ParticleData, Position, Recipe, Velocity,
};

// ---------------------------------------------------------------------------
// Serverbound
// ---------------------------------------------------------------------------

/// `0x00`: acknowledges a clientbound position sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeleportConfirm {
    pub teleport_id: i32,
}

impl TeleportConfirm {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            teleport_id: r.read_varint()?,
        })
    }
}

/// `0x03`: raw chat line, 256 chars max.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message: String,
}

impl ChatMessage {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        let message = r.read_string()?;
        if message.chars().count() > 256 {
            return Err(CodecError::OutOfRange("chat message"));
        }
        Ok(Self { message })
    }
}

/// `0x04`: respawn request (0) or stats request (1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStatus {
    pub action: i32,
}

impl ClientStatus {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            action: r.read_varint()?,
        })
    }
}

/// `0x05`: locale, render distance and cosmetic toggles.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub locale:               String,
    pub view_distance:        i8,
    pub chat_mode:            i32,
    pub chat_colors:          bool,
    pub displayed_skin_parts: u8,
    pub main_hand:            i32,
}

impl ClientSettings {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            locale:               r.read_string()?,
            view_distance:        r.read_i8()?,
            chat_mode:            r.read_varint()?,
            chat_colors:          r.read_bool()?,
            displayed_skin_parts: r.read_u8()?,
            main_hand:            r.read_varint()?,
        })
    }
}

/// `0x0B`: namespaced channel plus the rest of the frame as payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMessage {
    pub channel: String,
    pub data:    Vec<u8>,
}

impl PluginMessage {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        let channel = r.read_string()?;
        let data = r.read_raw(r.remaining())?.to_vec();
        Ok(Self { channel, data })
    }
}

/// `0x10`: echo of a clientbound keep-alive token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveServerbound {
    pub id: i64,
}

impl KeepAliveServerbound {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self { id: r.read_i64()? })
    }
}

/// `0x12`: absolute position update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPosition {
    pub x:         f64,
    pub y:         f64,
    pub z:         f64,
    pub on_ground: bool,
}

impl PlayerPosition {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x:         r.read_f64()?,
            y:         r.read_f64()?,
            z:         r.read_f64()?,
            on_ground: r.read_bool()?,
        })
    }
}

/// `0x13`: position and look in one packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPositionAndRotation {
    pub x:         f64,
    pub y:         f64,
    pub z:         f64,
    pub yaw:       f32,
    pub pitch:     f32,
    pub on_ground: bool,
}

impl PlayerPositionAndRotation {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x:         r.read_f64()?,
            y:         r.read_f64()?,
            z:         r.read_f64()?,
            yaw:       r.read_f32()?,
            pitch:     r.read_f32()?,
            on_ground: r.read_bool()?,
        })
    }
}

/// `0x14`: look only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRotation {
    pub yaw:       f32,
    pub pitch:     f32,
    pub on_ground: bool,
}

impl PlayerRotation {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            yaw:       r.read_f32()?,
            pitch:     r.read_f32()?,
            on_ground: r.read_bool()?,
        })
    }
}

/// `0x15`: on-ground flag only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMovement {
    pub on_ground: bool,
}

impl PlayerMovement {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            on_ground: r.read_bool()?,
        })
    }
}

/// `0x1A`: only the flying bit (0x02) is meaningful serverbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerAbilities {
    pub flags: u8,
}

impl PlayerAbilities {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self { flags: r.read_u8()? })
    }
}

/// `0x1B`: digging state machine update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerDigging {
    pub status:   i32,
    pub position: Position,
    pub face:     i8,
}

impl PlayerDigging {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            status:   r.read_varint()?,
            position: Position::read(r)?,
            face:     r.read_i8()?,
        })
    }
}

/// `0x1C`: sneak/sprint/bed state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityAction {
    pub entity_id:  i32,
    pub action:     i32,
    pub jump_boost: i32,
}

impl EntityAction {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            entity_id:  r.read_varint()?,
            action:     r.read_varint()?,
            jump_boost: r.read_varint()?,
        })
    }
}

/// `0x25`: hotbar slot selection, 0..=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldItemChangeServerbound {
    pub slot: i16,
}

impl HeldItemChangeServerbound {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        let slot = r.read_i16()?;
        if !(0..=8).contains(&slot) {
            return Err(CodecError::OutOfRange("held item slot"));
        }
        Ok(Self { slot })
    }
}

/// `0x28`: creative-mode slot overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct CreativeInventoryAction {
    pub slot: i16,
    pub item: Option<ItemStack>,
}

impl CreativeInventoryAction {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            slot: r.read_i16()?,
            item: ItemStack::read_slot(r)?,
        })
    }
}

/// `0x2B`: four lines of sign text.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSign {
    pub position: Position,
    pub lines:    [String; 4],
}

impl UpdateSign {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            position: Position::read(r)?,
            lines:    [
                r.read_string()?,
                r.read_string()?,
                r.read_string()?,
                r.read_string()?,
            ],
        })
    }
}

/// `0x2C`: arm swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub hand: i32,
}

impl Animation {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            hand: r.read_varint()?,
        })
    }
}

/// `0x2E`: block placement with in-block cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerBlockPlacement {
    pub hand:         i32,
    pub position:     Position,
    pub face:         i32,
    pub cursor_x:     f32,
    pub cursor_y:     f32,
    pub cursor_z:     f32,
    pub inside_block: bool,
}

impl PlayerBlockPlacement {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            hand:         r.read_varint()?,
            position:     Position::read(r)?,
            face:         r.read_varint()?,
            cursor_x:     r.read_f32()?,
            cursor_y:     r.read_f32()?,
            cursor_z:     r.read_f32()?,
            inside_block: r.read_bool()?,
        })
    }
}

/// `0x2F`: use of the held item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseItem {
    pub hand: i32,
}

impl UseItem {
    pub fn decode(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            hand: r.read_varint()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Clientbound
// ---------------------------------------------------------------------------

/// `0x04`: spawn another player entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPlayer {
    pub entity_id: i32,
    pub uuid:      Uuid,
    pub x:         f64,
    pub y:         f64,
    pub z:         f64,
    pub yaw:       Angle,
    pub pitch:     Angle,
}

impl SpawnPlayer {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_varint(self.entity_id);
        w.write_uuid(&self.uuid);
        w.write_f64(self.x);
        w.write_f64(self.y);
        w.write_f64(self.z);
        self.yaw.write(w);
        self.pitch.write(w);
    }
}

/// `0x0B`: single block update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChange {
    pub position:    Position,
    pub block_state: i32,
}

impl BlockChange {
    pub fn encode(&self, w: &mut WriteBuf) {
        self.position.write(w);
        w.write_varint(self.block_state);
    }
}

/// `0x0C`: boss bar management.
#[derive(Debug, Clone, PartialEq)]
pub struct BossBar {
    pub uuid:   Uuid,
    pub action: BossBarAction,
}

impl BossBar {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_uuid(&self.uuid);
        self.action.write(w)
    }
}

/// `0x0E`: chat component; position 0 chat, 1 system, 2 hotbar.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessageClientbound {
    pub message:  Chat,
    pub position: i8,
    pub sender:   Uuid,
}

impl ChatMessageClientbound {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        self.message.write(w)?;
        w.write_i8(self.position);
        w.write_uuid(&self.sender);
        Ok(())
    }
}

/// `0x10`: the brigadier command tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareCommands {
    pub nodes:      Vec<CommandNode>,
    pub root_index: i32,
}

impl DeclareCommands {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_varint(self.nodes.len() as i32);
        for node in &self.nodes {
            node.write(w)?;
        }
        w.write_varint(self.root_index);
        Ok(())
    }
}

/// `0x13`: full window contents; the count is a short in this version.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowItems {
    pub window_id: u8,
    pub slots:     Vec<Option<ItemStack>>,
}

impl WindowItems {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_u8(self.window_id);
        w.write_i16(self.slots.len() as i16);
        for slot in &self.slots {
            ItemStack::write_slot(slot, w);
        }
    }
}

/// `0x15`: single slot update.
#[derive(Debug, Clone, PartialEq)]
pub struct SetSlot {
    pub window_id: i8,
    pub slot:      i16,
    pub item:      Option<ItemStack>,
}

impl SetSlot {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i8(self.window_id);
        w.write_i16(self.slot);
        ItemStack::write_slot(&self.item, w);
    }
}

/// `0x19`: Play-state disconnect with a chat reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub reason: Chat,
}

impl Disconnect {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        self.reason.write(w)
    }
}

/// `0x1C`: forget a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnloadChunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl UnloadChunk {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i32(self.chunk_x);
        w.write_i32(self.chunk_z);
    }
}

/// `0x1F`: keep-alive token the client must echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveClientbound {
    pub id: i64,
}

impl KeepAliveClientbound {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i64(self.id);
    }
}

/// `0x20`: one chunk column. Section data arrives pre-serialised from the
/// world source; heightmaps and block entities embed as NBT.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkData {
    pub chunk_x:          i32,
    pub chunk_z:          i32,
    pub full_chunk:       bool,
    pub primary_bit_mask: i32,
    pub heightmaps:       Tag,
    pub biomes:           Option<Vec<i32>>,
    pub data:             Vec<u8>,
    pub block_entities:   Vec<Tag>,
}

impl ChunkData {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i32(self.chunk_x);
        w.write_i32(self.chunk_z);
        w.write_bool(self.full_chunk);
        w.write_varint(self.primary_bit_mask);
        nbt::write_root(w, &self.heightmaps);
        if let Some(biomes) = &self.biomes {
            w.write_varint(biomes.len() as i32);
            for biome in biomes {
                w.write_varint(*biome);
            }
        }
        w.write_byte_array(&self.data);
        w.write_varint(self.block_entities.len() as i32);
        for entity in &self.block_entities {
            nbt::write_root(w, entity);
        }
    }
}

/// `0x22`: particle burst with per-particle extra data.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub particle_id:   i32,
    pub long_distance: bool,
    pub x:             f64,
    pub y:             f64,
    pub z:             f64,
    pub offset_x:      f32,
    pub offset_y:      f32,
    pub offset_z:      f32,
    pub particle_data: f32,
    pub count:         i32,
    pub data:          ParticleData,
}

impl Particle {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i32(self.particle_id);
        w.write_bool(self.long_distance);
        w.write_f64(self.x);
        w.write_f64(self.y);
        w.write_f64(self.z);
        w.write_f32(self.offset_x);
        w.write_f32(self.offset_y);
        w.write_f32(self.offset_z);
        w.write_f32(self.particle_data);
        w.write_i32(self.count);
        self.data.write(w);
    }
}

/// `0x24`: world entry. Carries the dimension codec registry.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id:             i32,
    pub is_hardcore:           bool,
    pub gamemode:              u8,
    pub previous_gamemode:     i8,
    pub world_names:           Vec<String>,
    pub dimension_codec:       DimensionCodec,
    pub dimension:             DimensionType,
    pub world_name:            String,
    pub hashed_seed:           i64,
    pub max_players:           i32,
    pub view_distance:         i32,
    pub reduced_debug_info:    bool,
    pub enable_respawn_screen: bool,
    pub is_debug:              bool,
    pub is_flat:               bool,
}

impl JoinGame {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_i32(self.entity_id);
        w.write_bool(self.is_hardcore);
        w.write_u8(self.gamemode);
        w.write_i8(self.previous_gamemode);
        w.write_varint(self.world_names.len() as i32);
        for name in &self.world_names {
            w.write_string(name)?;
        }
        self.dimension_codec.write(w);
        nbt::write_root(w, &self.dimension.element());
        w.write_string(&self.world_name)?;
        w.write_i64(self.hashed_seed);
        w.write_varint(self.max_players);
        w.write_varint(self.view_distance);
        w.write_bool(self.reduced_debug_info);
        w.write_bool(self.enable_respawn_screen);
        w.write_bool(self.is_debug);
        w.write_bool(self.is_flat);
        Ok(())
    }
}

/// One tab-list entry for [`PlayerInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfoEntry {
    pub uuid:     Uuid,
    pub username: String,
    pub gamemode: i32,
    pub ping:     i32,
}

/// `0x32`: tab-list maintenance; the subset of actions the engine emits.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerInfo {
    AddPlayers(Vec<PlayerInfoEntry>),
    UpdateLatency(Vec<(Uuid, i32)>),
    RemovePlayers(Vec<Uuid>),
}

impl PlayerInfo {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        match self {
            PlayerInfo::AddPlayers(entries) => {
                w.write_varint(0);
                w.write_varint(entries.len() as i32);
                for entry in entries {
                    w.write_uuid(&entry.uuid);
                    w.write_string(&entry.username)?;
                    w.write_varint(0); // no profile properties
                    w.write_varint(entry.gamemode);
                    w.write_varint(entry.ping);
                    w.write_bool(false); // no display name
                }
            }
            PlayerInfo::UpdateLatency(entries) => {
                w.write_varint(2);
                w.write_varint(entries.len() as i32);
                for (uuid, ping) in entries {
                    w.write_uuid(uuid);
                    w.write_varint(*ping);
                }
            }
            PlayerInfo::RemovePlayers(uuids) => {
                w.write_varint(4);
                w.write_varint(uuids.len() as i32);
                for uuid in uuids {
                    w.write_uuid(uuid);
                }
            }
        }
        Ok(())
    }
}

/// `0x34`: authoritative position sync; client answers TeleportConfirm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPositionAndLook {
    pub x:           f64,
    pub y:           f64,
    pub z:           f64,
    pub yaw:         f32,
    pub pitch:       f32,
    pub flags:       u8,
    pub teleport_id: i32,
}

impl PlayerPositionAndLook {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_f64(self.x);
        w.write_f64(self.y);
        w.write_f64(self.z);
        w.write_f32(self.yaw);
        w.write_f32(self.pitch);
        w.write_u8(self.flags);
        w.write_varint(self.teleport_id);
    }
}

/// `0x3F`: hotbar selection sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldItemChangeClientbound {
    pub slot: i8,
}

impl HeldItemChangeClientbound {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i8(self.slot);
    }
}

/// `0x40`: recenter the client's chunk loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateViewPosition {
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl UpdateViewPosition {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_varint(self.chunk_x);
        w.write_varint(self.chunk_z);
    }
}

/// `0x42`: world spawn, used for the compass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPosition {
    pub position: Position,
}

impl SpawnPosition {
    pub fn encode(&self, w: &mut WriteBuf) {
        self.position.write(w);
    }
}

/// `0x44`: entity metadata; the terminator byte is written here.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadataPacket {
    pub entity_id: i32,
    pub metadata:  EntityMetadata,
}

impl EntityMetadataPacket {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_varint(self.entity_id);
        self.metadata.write(w)
    }
}

/// `0x46`: velocity in 1/8000 block per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityVelocity {
    pub entity_id: i32,
    pub velocity:  Velocity,
}

impl EntityVelocity {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_varint(self.entity_id);
        self.velocity.write(w);
    }
}

/// `0x4E`: world age and time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUpdate {
    pub world_age:   i64,
    pub time_of_day: i64,
}

impl TimeUpdate {
    pub fn encode(&self, w: &mut WriteBuf) {
        w.write_i64(self.world_age);
        w.write_i64(self.time_of_day);
    }
}

/// `0x57`: the recipe book contents.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareRecipes {
    pub recipes: Vec<Recipe>,
}

impl DeclareRecipes {
    pub fn encode(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_varint(self.recipes.len() as i32);
        for recipe in &self.recipes {
            recipe.write(w)?;
        }
        Ok(())
    }
}
