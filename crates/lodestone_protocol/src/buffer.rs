//! Length-delimited read and write buffers with typed accessors.
//!
//! [`ReadBuf`] is a cursor over one received frame; every accessor advances
//! it. [`WriteBuf`] appends to pooled storage that grows by doubling from a
//! 128-byte floor and returns to the pool on drop.
//!
//! All multi-byte scalars are big-endian on the wire. VarInt/VarLong use
//! the 7-bits-per-byte little-endian group encoding of the value's
//! unsigned bit pattern.

use lodestone_pool::{BufferPool, PooledBuf};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::error::CodecError;
use crate::MAX_STRING_CHARS;

/// Encode a varint into a small on-stack vector.
///
/// Stand-alone because frame framing needs varints outside any buffer.
pub fn varint_bytes(value: i32) -> SmallVec<[u8; 5]> {
    let mut out: SmallVec<[u8; 5]> = SmallVec::new_const();
    let mut uv = value as u32;

    loop {
        let mut b = (uv & 0x7F) as u8;
        uv >>= 7;
        if uv != 0 {
            b |= 0x80;
        }
        out.push(b);
        if uv == 0 {
            break;
        }
    }

    out
}

/// Number of bytes [`varint_bytes`] produces for `value`.
pub fn varint_len(value: i32) -> usize {
    let uv = value as u32;
    match uv {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Read cursor over a single decoded frame.
pub struct ReadBuf<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> ReadBuf<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Advance the cursor to the end of the frame, discarding the rest.
    /// Used when skipping a packet of unknown id.
    pub fn skip_to_end(&mut self) {
        self.pos = self.data.len();
    }

    fn check(&self, needed: usize) -> Result<(), CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::ShortRead {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.check(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.check(1)?;
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let raw = self.read_raw(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let raw = self.read_raw(4)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        let raw = self.read_raw(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        Ok(i64::from_be_bytes(bytes))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(self.read_i64()? as u64)
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    pub fn read_varint(&mut self) -> Result<i32, CodecError> {
        let mut result: u32 = 0;
        for shift in 0..5 {
            let b = self.read_u8()?;
            result |= ((b & 0x7F) as u32) << (7 * shift);
            if b & 0x80 == 0 {
                return Ok(result as i32);
            }
        }
        Err(CodecError::Malformed("varint longer than 5 bytes"))
    }

    pub fn read_varlong(&mut self) -> Result<i64, CodecError> {
        let mut result: u64 = 0;
        for shift in 0..10 {
            let b = self.read_u8()?;
            result |= ((b & 0x7F) as u64) << (7 * shift);
            if b & 0x80 == 0 {
                return Ok(result as i64);
            }
        }
        Err(CodecError::Malformed("varlong longer than 10 bytes"))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(CodecError::Malformed("negative string length"));
        }
        let len = len as usize;
        if len > self.remaining() {
            return Err(CodecError::Malformed("string length exceeds frame"));
        }

        let raw = self.read_raw(len)?;
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::Malformed("string utf-8"))?;
        if s.chars().count() > MAX_STRING_CHARS {
            return Err(CodecError::Malformed("string exceeds 32767 code points"));
        }
        Ok(s.to_string())
    }

    pub fn read_byte_array(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(CodecError::Malformed("negative array length"));
        }
        Ok(self.read_raw(len as usize)?.to_vec())
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, CodecError> {
        let raw = self.read_raw(16)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(raw);
        Ok(Uuid::from_bytes(bytes))
    }
}

/// Write sink for one outgoing frame body.
pub struct WriteBuf {
    buf: PooledBuf,
}

impl WriteBuf {
    pub fn new(pool: &BufferPool) -> Self {
        Self { buf: pool.take() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Surrender the pooled storage, e.g. to hand the encoded frame off.
    pub fn into_inner(self) -> PooledBuf {
        self.buf
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.reserve_more(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.reserve_more(1);
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_raw(&value.to_be_bytes());
    }

    pub fn write_varint(&mut self, value: i32) {
        self.write_raw(&varint_bytes(value));
    }

    pub fn write_varlong(&mut self, value: i64) {
        let mut uv = value as u64;
        loop {
            let mut b = (uv & 0x7F) as u8;
            uv >>= 7;
            if uv != 0 {
                b |= 0x80;
            }
            self.write_u8(b);
            if uv == 0 {
                break;
            }
        }
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), CodecError> {
        if s.chars().count() > MAX_STRING_CHARS {
            return Err(CodecError::OutOfRange("string"));
        }
        self.write_varint(s.len() as i32);
        self.write_raw(s.as_bytes());
        Ok(())
    }

    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as i32);
        self.write_raw(bytes);
    }

    pub fn write_uuid(&mut self, uuid: &Uuid) {
        self.write_raw(uuid.as_bytes());
    }
}
