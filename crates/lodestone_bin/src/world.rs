//! The world-source collaborator: block and chunk access consumed by the
//! join sequence and block-update handling. Terrain generation proper is
//! outside the protocol engine; the shipped [`FlatWorld`] serves a
//! superflat column so a client has something to stand on.

use dashmap::DashMap;
use lodestone_protocol::nbt::Tag;
use lodestone_protocol::packets::play::ChunkData;
use lodestone_protocol::types::Position;

/// Global palette id of a block state (754 registry numbering).
pub type BlockState = i32;

pub mod blocks {
    use super::BlockState;

    pub const AIR: BlockState = 0;
    pub const STONE: BlockState = 1;
    pub const GRASS_BLOCK: BlockState = 9;
    pub const DIRT: BlockState = 10;
    pub const BEDROCK: BlockState = 33;
}

/// One serialised chunk column, ready to become a `ChunkData` packet.
#[derive(Debug, Clone)]
pub struct ChunkColumn {
    pub chunk_x:          i32,
    pub chunk_z:          i32,
    pub primary_bit_mask: i32,
    pub heightmaps:       Tag,
    pub biomes:           Vec<i32>,
    pub sections_data:    Vec<u8>,
}

impl ChunkColumn {
    pub fn into_packet(self) -> ChunkData {
        ChunkData {
            chunk_x:          self.chunk_x,
            chunk_z:          self.chunk_z,
            full_chunk:       true,
            primary_bit_mask: self.primary_bit_mask,
            heightmaps:       self.heightmaps,
            biomes:           Some(self.biomes),
            data:             self.sections_data,
            block_entities:   Vec::new(),
        }
    }
}

pub trait WorldSource: Send + Sync + 'static {
    fn get_block(&self, pos: Position) -> BlockState;

    fn set_block(&self, pos: Position, block: BlockState);

    fn get_chunk(&self, chunk_x: i32, chunk_z: i32) -> ChunkColumn;
}

/// Superflat terrain: bedrock at y=0, dirt to y=2, grass at y=3. Block
/// edits are kept in an overlay map so they survive chunk re-requests.
pub struct FlatWorld {
    overrides: DashMap<Position, BlockState>,
}

const SURFACE_Y: i32 = 3;

impl FlatWorld {
    pub fn new() -> Self {
        Self {
            overrides: DashMap::new(),
        }
    }

    fn base_block(y: i32) -> BlockState {
        match y {
            0 => blocks::BEDROCK,
            1 | 2 => blocks::DIRT,
            SURFACE_Y => blocks::GRASS_BLOCK,
            _ => blocks::AIR,
        }
    }
}

impl Default for FlatWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldSource for FlatWorld {
    fn get_block(&self, pos: Position) -> BlockState {
        self.overrides
            .get(&pos)
            .map_or_else(|| Self::base_block(pos.y), |entry| *entry)
    }

    fn set_block(&self, pos: Position, block: BlockState) {
        self.overrides.insert(pos, block);
    }

    fn get_chunk(&self, chunk_x: i32, chunk_z: i32) -> ChunkColumn {
        let base_x = chunk_x * 16;
        let base_z = chunk_z * 16;

        // Only section 0 (y 0..16) ever holds blocks in a superflat world.
        let mut section = [blocks::AIR; 4096];
        for y in 0..16 {
            for z in 0..16 {
                for x in 0..16 {
                    let pos = Position::new(base_x + x, y, base_z + z);
                    section[(y * 256 + z * 16 + x) as usize] = self.get_block(pos);
                }
            }
        }

        ChunkColumn {
            chunk_x,
            chunk_z,
            primary_bit_mask: 0b1,
            heightmaps: motion_blocking_heightmap(SURFACE_Y + 1),
            biomes: vec![1; 1024], // plains
            sections_data: serialize_section(&section),
        }
    }
}

/// The MOTION_BLOCKING heightmap: 256 entries, 9 bits each, packed into
/// longs with no entry crossing a long boundary (1.16 packing).
fn motion_blocking_heightmap(height: i32) -> Tag {
    const BITS: u64 = 9;
    const PER_LONG: u64 = 64 / BITS; // 7 entries, 1 bit slack

    let mut longs = vec![0i64; 256usize.div_ceil(PER_LONG as usize)];
    for index in 0..256u64 {
        let long_index = (index / PER_LONG) as usize;
        let offset = (index % PER_LONG) * BITS;
        longs[long_index] |= ((height as u64 & 0x1FF) << offset) as i64;
    }

    Tag::compound(vec![("MOTION_BLOCKING", Tag::LongArray(longs))])
}

/// Serialise one 16x16x16 section: block count, bits-per-block, local
/// palette, then the packed data array.
fn serialize_section(cells: &[BlockState; 4096]) -> Vec<u8> {
    const BITS: u64 = 4;
    const PER_LONG: u64 = 64 / BITS;

    let mut palette: Vec<BlockState> = Vec::new();
    let mut indices = [0u64; 4096];
    let mut block_count: i16 = 0;

    for (i, block) in cells.iter().enumerate() {
        if *block != blocks::AIR {
            block_count += 1;
        }
        let palette_index = match palette.iter().position(|p| p == block) {
            Some(index) => index,
            None => {
                palette.push(*block);
                palette.len() - 1
            }
        };
        indices[i] = palette_index as u64;
    }

    let mut longs = vec![0u64; 4096usize.div_ceil(PER_LONG as usize)];
    for (i, palette_index) in indices.iter().enumerate() {
        let long_index = i / PER_LONG as usize;
        let offset = (i as u64 % PER_LONG) * BITS;
        longs[long_index] |= (palette_index & 0xF) << offset;
    }

    // Assembled with the same primitives the packet encoder uses.
    use lodestone_pool::BufferPool;
    use lodestone_protocol::buffer::WriteBuf;

    let pool = BufferPool::new();
    let mut w = WriteBuf::new(&pool);
    w.write_i16(block_count);
    w.write_u8(BITS as u8);
    w.write_varint(palette.len() as i32);
    for entry in &palette {
        w.write_varint(*entry);
    }
    w.write_varint(longs.len() as i32);
    for long in &longs {
        w.write_u64(*long);
    }
    w.into_inner().into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_world_layers() {
        let world = FlatWorld::new();
        assert_eq!(world.get_block(Position::new(5, 0, 5)), blocks::BEDROCK);
        assert_eq!(world.get_block(Position::new(5, 1, 5)), blocks::DIRT);
        assert_eq!(world.get_block(Position::new(5, 3, 5)), blocks::GRASS_BLOCK);
        assert_eq!(world.get_block(Position::new(5, 4, 5)), blocks::AIR);
    }

    #[test]
    fn test_set_block_overrides_terrain() {
        let world = FlatWorld::new();
        let pos = Position::new(-3, 10, 7);
        assert_eq!(world.get_block(pos), blocks::AIR);
        world.set_block(pos, blocks::STONE);
        assert_eq!(world.get_block(pos), blocks::STONE);
    }

    #[test]
    fn test_chunk_serialization_shape() {
        let world = FlatWorld::new();
        let column = world.get_chunk(0, 0);
        assert_eq!(column.primary_bit_mask, 1);
        assert_eq!(column.biomes.len(), 1024);

        // 4 layers of 256 non-air blocks.
        let mut r = lodestone_protocol::buffer::ReadBuf::new(&column.sections_data);
        assert_eq!(r.read_i16().unwrap(), 1024);
        assert_eq!(r.read_u8().unwrap(), 4);
        let palette_len = r.read_varint().unwrap();
        assert!(palette_len >= 4, "air + three terrain blocks");
    }

    #[test]
    fn test_heightmap_packing() {
        let tag = motion_blocking_heightmap(4);
        match tag.get("MOTION_BLOCKING") {
            Some(Tag::LongArray(longs)) => {
                assert_eq!(longs.len(), 37);
                // First entry sits in the low 9 bits.
                assert_eq!(longs[0] & 0x1FF, 4);
            }
            other => panic!("expected long array, got {other:?}"),
        }
    }
}
