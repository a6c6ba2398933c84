//! Wire-protocol engine for Minecraft Java Edition, protocol 754.
//!
//! The crate is the codec half of the server: typed read/write buffers over
//! pooled storage, the frame pipeline (length framing, zlib compression,
//! AES/CFB8 encryption), the NBT sub-codec, and the packet registry that
//! maps `(state, direction, id)` to typed packets.
//!
//! Connection lifecycle, session bookkeeping and gameplay dispatch live in
//! the server binary; everything here is usable against plain byte slices,
//! which is how the unit tests drive it.

pub mod buffer;
pub mod crypto;
pub mod error;
pub mod frame;
pub mod nbt;
pub mod packets;
pub mod types;

pub use buffer::{ReadBuf, WriteBuf};
pub use error::CodecError;
pub use frame::{FrameReader, FrameWriter};
pub use packets::{ClientboundPacket, Direction, ProtocolState, ServerboundPacket};

/// The pinned wire protocol version (game 1.16.4 / 1.16.5).
pub const PROTOCOL_VERSION: i32 = 754;

/// Human-readable game version matching [`PROTOCOL_VERSION`].
pub const GAME_VERSION: &str = "1.16.5";

/// Upper bound on a declared frame length. Anything larger is malformed.
pub const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// Maximum string length in UTF-16 code units the protocol permits.
pub const MAX_STRING_CHARS: usize = 32767;
