//! Composite protocol value shapes: packed positions, chat components,
//! item stacks, entity metadata, recipes, command trees, boss bars,
//! particles and the dimension codec.
//!
//! Each type carries its own `read`/`write` pair over the codec buffers,
//! so packets compose them without extra copies.

use uuid::Uuid;

use crate::buffer::{ReadBuf, WriteBuf};
use crate::error::CodecError;
use crate::nbt::{self, Tag};

/// A block position packed into one 64-bit word: `X:26 | Z:26 | Y:12`,
/// each field signed two's-complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn pack(&self) -> i64 {
        (((self.x as i64) & 0x3FF_FFFF) << 38)
            | (((self.z as i64) & 0x3FF_FFFF) << 12)
            | ((self.y as i64) & 0xFFF)
    }

    pub fn unpack(word: i64) -> Self {
        let mut x = (word >> 38) & 0x3FF_FFFF;
        let mut z = (word >> 12) & 0x3FF_FFFF;
        let mut y = word & 0xFFF;

        // Sign-extend each field from its packed width.
        if x >= 1 << 25 {
            x -= 1 << 26;
        }
        if z >= 1 << 25 {
            z -= 1 << 26;
        }
        if y >= 1 << 11 {
            y -= 1 << 12;
        }

        Self {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        }
    }

    pub fn write(&self, w: &mut WriteBuf) {
        w.write_i64(self.pack());
    }

    pub fn read(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self::unpack(r.read_i64()?))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Three consecutive big-endian doubles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsolutePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AbsolutePosition {
    pub fn write(&self, w: &mut WriteBuf) {
        w.write_f64(self.x);
        w.write_f64(self.y);
        w.write_f64(self.z);
    }

    pub fn read(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x: r.read_f64()?,
            y: r.read_f64()?,
            z: r.read_f64()?,
        })
    }
}

/// Entity velocity, three big-endian shorts in 1/8000 block per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Velocity {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Velocity {
    pub fn write(&self, w: &mut WriteBuf) {
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_i16(self.z);
    }

    pub fn read(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x: r.read_i16()?,
            y: r.read_i16()?,
            z: r.read_i16()?,
        })
    }
}

/// One unsigned byte in units of 1/256 of a full turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Angle(pub u8);

impl Angle {
    pub fn from_degrees(degrees: f32) -> Self {
        Self((degrees.rem_euclid(360.0) / 360.0 * 256.0) as u8)
    }

    pub fn write(&self, w: &mut WriteBuf) {
        w.write_u8(self.0);
    }

    pub fn read(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        Ok(Self(r.read_u8()?))
    }
}

/// A chat component: a String field carrying a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat(pub serde_json::Value);

impl Chat {
    /// Plain text component.
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self(serde_json::json!({ "text": text.into() }))
    }

    pub fn write(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_string(&self.0.to_string())
    }

    pub fn read(r: &mut ReadBuf<'_>) -> Result<Self, CodecError> {
        let raw = r.read_string()?;
        let value =
            serde_json::from_str(&raw).map_err(|_| CodecError::Malformed("chat json"))?;
        Ok(Self(value))
    }
}

/// An item stack slot. `None` is the empty slot (`present == false`).
///
/// When present, the NBT body is always on the wire, a lone `TAG_End`
/// standing in for "no tag".
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub item_id: i32,
    pub count:   i8,
    pub nbt:     Option<Tag>,
}

impl ItemStack {
    pub fn write_slot(slot: &Option<ItemStack>, w: &mut WriteBuf) {
        match slot {
            None => w.write_bool(false),
            Some(stack) => {
                w.write_bool(true);
                w.write_varint(stack.item_id);
                w.write_i8(stack.count);
                match &stack.nbt {
                    Some(tag) => nbt::write_root(w, tag),
                    None => nbt::write_empty(w),
                }
            }
        }
    }

    pub fn read_slot(r: &mut ReadBuf<'_>) -> Result<Option<ItemStack>, CodecError> {
        if !r.read_bool()? {
            return Ok(None);
        }

        let item_id = r.read_varint()?;
        let count = r.read_i8()?;
        let nbt = nbt::read_named(r)?.map(|(_, tag)| tag);

        Ok(Some(ItemStack { item_id, count, nbt }))
    }
}

/// Entity metadata field types, protocol 754 numbering.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    String(String),
    Chat(Chat),
    OptChat(Option<Chat>),
    Slot(Option<ItemStack>),
    Boolean(bool),
    Rotation(f32, f32, f32),
    Position(Position),
    OptPosition(Option<Position>),
    Direction(i32),
    OptUuid(Option<Uuid>),
    OptBlockId(i32),
    Nbt(Tag),
    Pose(i32),
}

impl MetadataValue {
    pub fn type_id(&self) -> i32 {
        match self {
            MetadataValue::Byte(_) => 0,
            MetadataValue::VarInt(_) => 1,
            MetadataValue::Float(_) => 2,
            MetadataValue::String(_) => 3,
            MetadataValue::Chat(_) => 4,
            MetadataValue::OptChat(_) => 5,
            MetadataValue::Slot(_) => 6,
            MetadataValue::Boolean(_) => 7,
            MetadataValue::Rotation(..) => 8,
            MetadataValue::Position(_) => 9,
            MetadataValue::OptPosition(_) => 10,
            MetadataValue::Direction(_) => 11,
            MetadataValue::OptUuid(_) => 12,
            MetadataValue::OptBlockId(_) => 13,
            MetadataValue::Nbt(_) => 14,
            MetadataValue::Pose(_) => 18,
        }
    }

    fn write_value(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        match self {
            MetadataValue::Byte(v) => w.write_i8(*v),
            MetadataValue::VarInt(v) => w.write_varint(*v),
            MetadataValue::Float(v) => w.write_f32(*v),
            MetadataValue::String(v) => w.write_string(v)?,
            MetadataValue::Chat(v) => v.write(w)?,
            MetadataValue::OptChat(v) => {
                w.write_bool(v.is_some());
                if let Some(chat) = v {
                    chat.write(w)?;
                }
            }
            MetadataValue::Slot(v) => ItemStack::write_slot(v, w),
            MetadataValue::Boolean(v) => w.write_bool(*v),
            MetadataValue::Rotation(x, y, z) => {
                w.write_f32(*x);
                w.write_f32(*y);
                w.write_f32(*z);
            }
            MetadataValue::Position(v) => v.write(w),
            MetadataValue::OptPosition(v) => {
                w.write_bool(v.is_some());
                if let Some(pos) = v {
                    pos.write(w);
                }
            }
            MetadataValue::Direction(v) | MetadataValue::OptBlockId(v) => w.write_varint(*v),
            MetadataValue::OptUuid(v) => {
                w.write_bool(v.is_some());
                if let Some(uuid) = v {
                    w.write_uuid(uuid);
                }
            }
            MetadataValue::Nbt(v) => nbt::write_root(w, v),
            MetadataValue::Pose(v) => w.write_varint(*v),
        }
        Ok(())
    }
}

/// Entity metadata writer. The outer packet encoder writes the `0xFF`
/// terminator via [`EntityMetadata::write`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMetadata {
    pub entries: Vec<(u8, MetadataValue)>,
}

impl EntityMetadata {
    /// Header primitive: index byte followed by the type varint.
    pub fn write_header(w: &mut WriteBuf, index: u8, type_id: i32) {
        w.write_u8(index);
        w.write_varint(type_id);
    }

    pub fn write(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        for (index, value) in &self.entries {
            Self::write_header(w, *index, value.type_id());
            value.write_value(w)?;
        }
        w.write_u8(0xFF);
        Ok(())
    }
}

/// Recipe bodies, discriminated by the type identifier string.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeBody {
    /// `minecraft:crafting_shapeless`
    Shapeless {
        group:       String,
        ingredients: Vec<Vec<Option<ItemStack>>>,
        result:      Option<ItemStack>,
    },
    /// `minecraft:crafting_shaped`
    Shaped {
        width:       i32,
        height:      i32,
        group:       String,
        ingredients: Vec<Vec<Option<ItemStack>>>,
        result:      Option<ItemStack>,
    },
    /// `minecraft:smelting`, `blasting`, `smoking`, `campfire_cooking`
    Cooking {
        group:        String,
        ingredient:   Vec<Option<ItemStack>>,
        result:       Option<ItemStack>,
        experience:   f32,
        cooking_time: i32,
    },
    /// `minecraft:stonecutting`
    Stonecutting {
        group:      String,
        ingredient: Vec<Option<ItemStack>>,
        result:     Option<ItemStack>,
    },
    /// `minecraft:smithing`
    Smithing {
        base:     Vec<Option<ItemStack>>,
        addition: Vec<Option<ItemStack>>,
        result:   Option<ItemStack>,
    },
    /// Special recipes (`crafting_special_*`) carry no body.
    Special,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Type discriminator, e.g. `minecraft:crafting_shaped`.
    pub kind: String,
    /// Recipe identifier, e.g. `minecraft:oak_planks`.
    pub id:   String,
    pub body: RecipeBody,
}

fn write_ingredient(w: &mut WriteBuf, options: &[Option<ItemStack>]) {
    w.write_varint(options.len() as i32);
    for option in options {
        ItemStack::write_slot(option, w);
    }
}

impl Recipe {
    pub fn write(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        w.write_string(&self.kind)?;
        w.write_string(&self.id)?;

        match &self.body {
            RecipeBody::Shapeless {
                group,
                ingredients,
                result,
            } => {
                w.write_string(group)?;
                w.write_varint(ingredients.len() as i32);
                for ingredient in ingredients {
                    write_ingredient(w, ingredient);
                }
                ItemStack::write_slot(result, w);
            }
            RecipeBody::Shaped {
                width,
                height,
                group,
                ingredients,
                result,
            } => {
                if ingredients.len() as i64 != (*width as i64) * (*height as i64) {
                    return Err(CodecError::OutOfRange("shaped recipe grid"));
                }
                w.write_varint(*width);
                w.write_varint(*height);
                w.write_string(group)?;
                for ingredient in ingredients {
                    write_ingredient(w, ingredient);
                }
                ItemStack::write_slot(result, w);
            }
            RecipeBody::Cooking {
                group,
                ingredient,
                result,
                experience,
                cooking_time,
            } => {
                w.write_string(group)?;
                write_ingredient(w, ingredient);
                ItemStack::write_slot(result, w);
                w.write_f32(*experience);
                w.write_varint(*cooking_time);
            }
            RecipeBody::Stonecutting {
                group,
                ingredient,
                result,
            } => {
                w.write_string(group)?;
                write_ingredient(w, ingredient);
                ItemStack::write_slot(result, w);
            }
            RecipeBody::Smithing {
                base,
                addition,
                result,
            } => {
                write_ingredient(w, base);
                write_ingredient(w, addition);
                ItemStack::write_slot(result, w);
            }
            RecipeBody::Special => {}
        }

        Ok(())
    }
}

/// Declare-commands node. Indices refer into the node array of the packet.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    pub kind:        CommandNodeKind,
    pub executable:  bool,
    pub children:    Vec<i32>,
    pub redirect:    Option<i32>,
    pub suggestions: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandNodeKind {
    Root,
    Literal { name: String },
    Argument { name: String, parser: CommandParser },
}

/// Brigadier parser identifiers and their property payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandParser {
    /// `brigadier:bool`
    Bool,
    /// `brigadier:integer` with optional bounds.
    Integer { min: Option<i32>, max: Option<i32> },
    /// `brigadier:double` with optional bounds.
    Double { min: Option<f64>, max: Option<f64> },
    /// `brigadier:string`; 0 single word, 1 quotable, 2 greedy.
    String { behavior: i32 },
    /// `minecraft:entity`; bit 0 single target, bit 1 players only.
    Entity { flags: u8 },
    /// Any parser without properties, e.g. `minecraft:vec3`.
    Bare { identifier: String },
}

const NODE_TYPE_LITERAL: u8 = 0x01;
const NODE_TYPE_ARGUMENT: u8 = 0x02;
const NODE_FLAG_EXECUTABLE: u8 = 0x04;
const NODE_FLAG_REDIRECT: u8 = 0x08;
const NODE_FLAG_SUGGESTIONS: u8 = 0x10;

impl CommandNode {
    pub fn write(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        let mut flags = match self.kind {
            CommandNodeKind::Root => 0x00,
            CommandNodeKind::Literal { .. } => NODE_TYPE_LITERAL,
            CommandNodeKind::Argument { .. } => NODE_TYPE_ARGUMENT,
        };
        if self.executable {
            flags |= NODE_FLAG_EXECUTABLE;
        }
        if self.redirect.is_some() {
            flags |= NODE_FLAG_REDIRECT;
        }
        if self.suggestions.is_some() {
            flags |= NODE_FLAG_SUGGESTIONS;
        }

        w.write_u8(flags);
        w.write_varint(self.children.len() as i32);
        for child in &self.children {
            w.write_varint(*child);
        }
        if let Some(redirect) = self.redirect {
            w.write_varint(redirect);
        }

        match &self.kind {
            CommandNodeKind::Root => {}
            CommandNodeKind::Literal { name } => w.write_string(name)?,
            CommandNodeKind::Argument { name, parser } => {
                w.write_string(name)?;
                parser.write(w)?;
            }
        }

        if let Some(suggestions) = &self.suggestions {
            w.write_string(suggestions)?;
        }

        Ok(())
    }
}

impl CommandParser {
    fn write(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        match self {
            CommandParser::Bool => w.write_string("brigadier:bool")?,
            CommandParser::Integer { min, max } => {
                w.write_string("brigadier:integer")?;
                let flags = u8::from(min.is_some()) | (u8::from(max.is_some()) << 1);
                w.write_u8(flags);
                if let Some(min) = min {
                    w.write_i32(*min);
                }
                if let Some(max) = max {
                    w.write_i32(*max);
                }
            }
            CommandParser::Double { min, max } => {
                w.write_string("brigadier:double")?;
                let flags = u8::from(min.is_some()) | (u8::from(max.is_some()) << 1);
                w.write_u8(flags);
                if let Some(min) = min {
                    w.write_f64(*min);
                }
                if let Some(max) = max {
                    w.write_f64(*max);
                }
            }
            CommandParser::String { behavior } => {
                w.write_string("brigadier:string")?;
                w.write_varint(*behavior);
            }
            CommandParser::Entity { flags } => {
                w.write_string("minecraft:entity")?;
                w.write_u8(*flags);
            }
            CommandParser::Bare { identifier } => w.write_string(identifier)?,
        }
        Ok(())
    }
}

/// Boss bar actions, tagged by the action varint.
#[derive(Debug, Clone, PartialEq)]
pub enum BossBarAction {
    Add {
        title:    Chat,
        health:   f32,
        color:    i32,
        division: i32,
        flags:    u8,
    },
    Remove,
    UpdateHealth { health: f32 },
    UpdateTitle { title: Chat },
    UpdateStyle { color: i32, division: i32 },
    UpdateFlags { flags: u8 },
}

impl BossBarAction {
    pub fn write(&self, w: &mut WriteBuf) -> Result<(), CodecError> {
        match self {
            BossBarAction::Add {
                title,
                health,
                color,
                division,
                flags,
            } => {
                w.write_varint(0);
                title.write(w)?;
                w.write_f32(*health);
                w.write_varint(*color);
                w.write_varint(*division);
                w.write_u8(*flags);
            }
            BossBarAction::Remove => w.write_varint(1),
            BossBarAction::UpdateHealth { health } => {
                w.write_varint(2);
                w.write_f32(*health);
            }
            BossBarAction::UpdateTitle { title } => {
                w.write_varint(3);
                title.write(w)?;
            }
            BossBarAction::UpdateStyle { color, division } => {
                w.write_varint(4);
                w.write_varint(*color);
                w.write_varint(*division);
            }
            BossBarAction::UpdateFlags { flags } => {
                w.write_varint(5);
                w.write_u8(*flags);
            }
        }
        Ok(())
    }
}

/// Per-particle extra data; most particles carry none.
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleData {
    Plain,
    Block { state: i32 },
    Dust { red: f32, green: f32, blue: f32, scale: f32 },
    Item { item: Option<ItemStack> },
}

impl ParticleData {
    pub fn write(&self, w: &mut WriteBuf) {
        match self {
            ParticleData::Plain => {}
            ParticleData::Block { state } => w.write_varint(*state),
            ParticleData::Dust {
                red,
                green,
                blue,
                scale,
            } => {
                w.write_f32(*red);
                w.write_f32(*green);
                w.write_f32(*blue);
                w.write_f32(*scale);
            }
            ParticleData::Item { item } => ItemStack::write_slot(item, w),
        }
    }
}

/// A dimension-type element of the registry sent with JoinGame.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionType {
    pub name:                 String,
    pub natural:              bool,
    pub ambient_light:        f32,
    pub has_ceiling:          bool,
    pub has_skylight:         bool,
    pub fixed_time:           Option<i64>,
    pub ultrawarm:            bool,
    pub has_raids:            bool,
    pub respawn_anchor_works: bool,
    pub bed_works:            bool,
    pub piglin_safe:          bool,
    pub coordinate_scale:     f32,
    pub logical_height:       i32,
    pub infiniburn:           String,
    pub effects:              String,
}

impl DimensionType {
    pub fn overworld() -> Self {
        Self {
            name:                 "minecraft:overworld".to_string(),
            natural:              true,
            ambient_light:        0.0,
            has_ceiling:          false,
            has_skylight:         true,
            fixed_time:           None,
            ultrawarm:            false,
            has_raids:            true,
            respawn_anchor_works: false,
            bed_works:            true,
            piglin_safe:          false,
            coordinate_scale:     1.0,
            logical_height:       256,
            infiniburn:           "minecraft:infiniburn_overworld".to_string(),
            effects:              "minecraft:overworld".to_string(),
        }
    }

    /// The `element` compound for this dimension type.
    pub fn element(&self) -> Tag {
        let mut entries = vec![
            ("natural".to_string(), Tag::Byte(i8::from(self.natural))),
            ("ambient_light".to_string(), Tag::Float(self.ambient_light)),
            ("has_ceiling".to_string(), Tag::Byte(i8::from(self.has_ceiling))),
            ("has_skylight".to_string(), Tag::Byte(i8::from(self.has_skylight))),
            ("ultrawarm".to_string(), Tag::Byte(i8::from(self.ultrawarm))),
            ("has_raids".to_string(), Tag::Byte(i8::from(self.has_raids))),
            (
                "respawn_anchor_works".to_string(),
                Tag::Byte(i8::from(self.respawn_anchor_works)),
            ),
            ("bed_works".to_string(), Tag::Byte(i8::from(self.bed_works))),
            ("piglin_safe".to_string(), Tag::Byte(i8::from(self.piglin_safe))),
            ("coordinate_scale".to_string(), Tag::Float(self.coordinate_scale)),
            ("logical_height".to_string(), Tag::Int(self.logical_height)),
            ("infiniburn".to_string(), Tag::String(self.infiniburn.clone())),
            ("effects".to_string(), Tag::String(self.effects.clone())),
        ];
        if let Some(fixed_time) = self.fixed_time {
            entries.push(("fixed_time".to_string(), Tag::Long(fixed_time)));
        }
        Tag::Compound(entries)
    }
}

/// A worldgen biome element of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Biome {
    pub name:          String,
    pub precipitation: String,
    pub depth:         f32,
    pub temperature:   f32,
    pub scale:         f32,
    pub downfall:      f32,
    pub category:      String,
    pub sky_color:     i32,
    pub water_color:   i32,
    pub fog_color:     i32,
    pub water_fog:     i32,
}

impl Biome {
    pub fn plains() -> Self {
        Self {
            name:          "minecraft:plains".to_string(),
            precipitation: "rain".to_string(),
            depth:         0.125,
            temperature:   0.8,
            scale:         0.05,
            downfall:      0.4,
            category:      "plains".to_string(),
            sky_color:     0x78A7FF,
            water_color:   0x3F76E4,
            fog_color:     0xC0D8FF,
            water_fog:     0x050533,
        }
    }

    pub fn element(&self) -> Tag {
        Tag::compound(vec![
            ("precipitation", Tag::String(self.precipitation.clone())),
            ("depth", Tag::Float(self.depth)),
            ("temperature", Tag::Float(self.temperature)),
            ("scale", Tag::Float(self.scale)),
            ("downfall", Tag::Float(self.downfall)),
            ("category", Tag::String(self.category.clone())),
            (
                "effects",
                Tag::compound(vec![
                    ("sky_color", Tag::Int(self.sky_color)),
                    ("water_color", Tag::Int(self.water_color)),
                    ("fog_color", Tag::Int(self.fog_color)),
                    ("water_fog_color", Tag::Int(self.water_fog)),
                    (
                        "mood_sound",
                        Tag::compound(vec![
                            ("tick_delay", Tag::Int(6000)),
                            ("offset", Tag::Double(2.0)),
                            ("sound", Tag::String("minecraft:ambient.cave".to_string())),
                            ("block_search_extent", Tag::Int(8)),
                        ]),
                    ),
                ]),
            ),
        ])
    }
}

/// The registry compound sent inside JoinGame: dimension types and biomes.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionCodec {
    pub dimensions: Vec<DimensionType>,
    pub biomes:     Vec<Biome>,
}

impl Default for DimensionCodec {
    fn default() -> Self {
        Self {
            dimensions: vec![DimensionType::overworld()],
            biomes:     vec![Biome::plains()],
        }
    }
}

impl DimensionCodec {
    pub fn to_nbt(&self) -> Tag {
        let dimension_entries: Vec<Tag> = self
            .dimensions
            .iter()
            .enumerate()
            .map(|(id, dim)| {
                Tag::compound(vec![
                    ("name", Tag::String(dim.name.clone())),
                    ("id", Tag::Int(id as i32)),
                    ("element", dim.element()),
                ])
            })
            .collect();

        let biome_entries: Vec<Tag> = self
            .biomes
            .iter()
            .enumerate()
            .map(|(id, biome)| {
                Tag::compound(vec![
                    ("name", Tag::String(biome.name.clone())),
                    ("id", Tag::Int(id as i32)),
                    ("element", biome.element()),
                ])
            })
            .collect();

        Tag::compound(vec![
            (
                "minecraft:dimension_type",
                Tag::compound(vec![
                    ("type", Tag::String("minecraft:dimension_type".to_string())),
                    ("value", Tag::List(dimension_entries)),
                ]),
            ),
            (
                "minecraft:worldgen/biome",
                Tag::compound(vec![
                    ("type", Tag::String("minecraft:worldgen/biome".to_string())),
                    ("value", Tag::List(biome_entries)),
                ]),
            ),
        ])
    }

    pub fn write(&self, w: &mut WriteBuf) {
        nbt::write_root(w, &self.to_nbt());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_pool::BufferPool;

    fn pool() -> BufferPool {
        BufferPool::new()
    }

    #[test]
    fn test_position_literal_vector() {
        // From the protocol reference: x=18357644, z=-20882616, y=831.
        let pos = Position::new(18357644, 831, -20882616);
        assert_eq!(pos.pack() as u64, 0x4607_632C_15B4_833F);
        assert_eq!(Position::unpack(pos.pack()), pos);
    }

    #[test]
    fn test_position_roundtrip_extremes() {
        let cases = [
            Position::new(0, 0, 0),
            Position::new(-1, -1, -1),
            Position::new((1 << 25) - 1, (1 << 11) - 1, (1 << 25) - 1),
            Position::new(-(1 << 25), -(1 << 11), -(1 << 25)),
            Position::new(12345, -64, -54321),
        ];

        let p = pool();
        for pos in cases {
            let mut w = WriteBuf::new(&p);
            pos.write(&mut w);
            assert_eq!(w.len(), 8);
            let mut r = ReadBuf::new(w.as_slice());
            assert_eq!(Position::read(&mut r).unwrap(), pos);
        }
    }

    #[test]
    fn test_position_sign_extension() {
        // Middle 26 bits with the top bit set must come back negative.
        let pos = Position::new(0, 0, -1);
        let word = pos.pack();
        assert_eq!((word >> 12) & 0x3FF_FFFF, 0x3FF_FFFF);
        assert_eq!(Position::unpack(word).z, -1);
    }

    #[test]
    fn test_item_stack_roundtrip() {
        let p = pool();
        let cases = [
            None,
            Some(ItemStack {
                item_id: 1,
                count:   64,
                nbt:     None,
            }),
            Some(ItemStack {
                item_id: 276,
                count:   1,
                nbt:     Some(Tag::compound(vec![
                    ("Damage", Tag::Int(10)),
                    ("Unbreakable", Tag::Byte(1)),
                ])),
            }),
        ];

        for slot in cases {
            let mut w = WriteBuf::new(&p);
            ItemStack::write_slot(&slot, &mut w);
            let mut r = ReadBuf::new(w.as_slice());
            assert_eq!(ItemStack::read_slot(&mut r).unwrap(), slot);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_item_stack_empty_nbt_is_single_tag_end() {
        let p = pool();
        let mut w = WriteBuf::new(&p);
        ItemStack::write_slot(
            &Some(ItemStack {
                item_id: 1,
                count:   1,
                nbt:     None,
            }),
            &mut w,
        );
        // present, id, count, TAG_End.
        assert_eq!(w.as_slice(), [0x01, 0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_metadata_terminated() {
        let p = pool();
        let meta = EntityMetadata {
            entries: vec![
                (0, MetadataValue::Byte(0x02)),
                (6, MetadataValue::Pose(1)),
                (7, MetadataValue::Boolean(true)),
            ],
        };
        let mut w = WriteBuf::new(&p);
        meta.write(&mut w).unwrap();

        let bytes = w.as_slice();
        assert_eq!(bytes[bytes.len() - 1], 0xFF);
        // index 0, type 0 (byte), value 0x02
        assert_eq!(&bytes[..3], [0x00, 0x00, 0x02]);
        // index 6, type 18 (pose), value 1
        assert_eq!(&bytes[3..6], [0x06, 0x12, 0x01]);
    }

    #[test]
    fn test_chat_roundtrip() {
        let p = pool();
        let chat = Chat::text("hello, world");
        let mut w = WriteBuf::new(&p);
        chat.write(&mut w).unwrap();
        let mut r = ReadBuf::new(w.as_slice());
        assert_eq!(Chat::read(&mut r).unwrap(), chat);
    }

    #[test]
    fn test_shaped_recipe_grid_must_match() {
        let p = pool();
        let recipe = Recipe {
            kind: "minecraft:crafting_shaped".to_string(),
            id:   "minecraft:broken".to_string(),
            body: RecipeBody::Shaped {
                width:       2,
                height:      2,
                group:       String::new(),
                ingredients: vec![vec![None]; 3],
                result:      None,
            },
        };
        let mut w = WriteBuf::new(&p);
        assert!(matches!(recipe.write(&mut w), Err(CodecError::OutOfRange(_))));
    }

    #[test]
    fn test_command_node_flags() {
        let p = pool();
        let node = CommandNode {
            kind:        CommandNodeKind::Argument {
                name:   "target".to_string(),
                parser: CommandParser::Entity { flags: 0x03 },
            },
            executable:  true,
            children:    vec![],
            redirect:    None,
            suggestions: None,
        };
        let mut w = WriteBuf::new(&p);
        node.write(&mut w).unwrap();
        // argument | executable
        assert_eq!(w.as_slice()[0], 0x06);
    }

    #[test]
    fn test_boss_bar_action_tags() {
        let p = pool();
        let mut w = WriteBuf::new(&p);
        BossBarAction::Remove.write(&mut w).unwrap();
        assert_eq!(w.as_slice(), [0x01]);

        let mut w = WriteBuf::new(&p);
        BossBarAction::UpdateHealth { health: 0.5 }.write(&mut w).unwrap();
        assert_eq!(w.as_slice()[0], 0x02);
    }

    #[test]
    fn test_dimension_codec_structure() {
        let codec = DimensionCodec::default();
        let tag = codec.to_nbt();

        let dims = tag.get("minecraft:dimension_type").unwrap();
        assert_eq!(
            dims.get("type"),
            Some(&Tag::String("minecraft:dimension_type".to_string()))
        );
        assert!(matches!(dims.get("value"), Some(Tag::List(items)) if items.len() == 1));

        assert!(tag.get("minecraft:worldgen/biome").is_some());
    }

    #[test]
    fn test_absolute_position_and_velocity_roundtrip() {
        let p = pool();

        let pos = AbsolutePosition {
            x: 100.5,
            y: -64.25,
            z: 8.0,
        };
        let mut w = WriteBuf::new(&p);
        pos.write(&mut w);
        assert_eq!(w.len(), 24);
        let mut r = ReadBuf::new(w.as_slice());
        assert_eq!(AbsolutePosition::read(&mut r).unwrap(), pos);

        let velocity = Velocity {
            x: -8000,
            y: 0,
            z: 8000,
        };
        let mut w = WriteBuf::new(&p);
        velocity.write(&mut w);
        assert_eq!(w.len(), 6);
        let mut r = ReadBuf::new(w.as_slice());
        assert_eq!(Velocity::read(&mut r).unwrap(), velocity);
    }

    #[test]
    fn test_angle_from_degrees() {
        assert_eq!(Angle::from_degrees(0.0).0, 0);
        assert_eq!(Angle::from_degrees(90.0).0, 64);
        assert_eq!(Angle::from_degrees(-90.0).0, 192);
    }
}
