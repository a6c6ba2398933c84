//! Named Binary Tag sub-codec.
//!
//! Item metadata, chunk heightmaps and the dimension codec embed NBT
//! documents inside packets. The writer targets the same [`WriteBuf`] the
//! packet encoder uses, so no intermediate allocation happens; the reader
//! walks a [`ReadBuf`] cursor in place.
//!
//! Tag names use the Java-modified UTF-8 length prefix (u16); payload
//! scalars are big-endian like everything else on the wire.

use crate::buffer::{ReadBuf, WriteBuf};
use crate::error::CodecError;

const TAG_END: u8 = 0x00;
const TAG_BYTE: u8 = 0x01;
const TAG_SHORT: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_LONG: u8 = 0x04;
const TAG_FLOAT: u8 = 0x05;
const TAG_DOUBLE: u8 = 0x06;
const TAG_BYTE_ARRAY: u8 = 0x07;
const TAG_STRING: u8 = 0x08;
const TAG_LIST: u8 = 0x09;
const TAG_COMPOUND: u8 = 0x0A;
const TAG_INT_ARRAY: u8 = 0x0B;
const TAG_LONG_ARRAY: u8 = 0x0C;

/// Nesting bound; a document deeper than this is malformed.
const MAX_DEPTH: u32 = 32;

/// One NBT value. Compounds keep insertion order so an encoded document
/// round-trips byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(Vec<Tag>),
    Compound(Vec<(String, Tag)>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn type_id(&self) -> u8 {
        match self {
            Tag::Byte(_) => TAG_BYTE,
            Tag::Short(_) => TAG_SHORT,
            Tag::Int(_) => TAG_INT,
            Tag::Long(_) => TAG_LONG,
            Tag::Float(_) => TAG_FLOAT,
            Tag::Double(_) => TAG_DOUBLE,
            Tag::ByteArray(_) => TAG_BYTE_ARRAY,
            Tag::String(_) => TAG_STRING,
            Tag::List(_) => TAG_LIST,
            Tag::Compound(_) => TAG_COMPOUND,
            Tag::IntArray(_) => TAG_INT_ARRAY,
            Tag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Convenience constructor for a compound from `(name, tag)` pairs.
    pub fn compound<N: Into<String>>(entries: Vec<(N, Tag)>) -> Tag {
        Tag::Compound(entries.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    /// Look up a direct child of a compound by name.
    pub fn get(&self, name: &str) -> Option<&Tag> {
        match self {
            Tag::Compound(entries) => entries.iter().find(|(n, _)| n == name).map(|(_, t)| t),
            _ => None,
        }
    }
}

fn write_name(w: &mut WriteBuf, name: &str) {
    w.write_u16(name.len() as u16);
    w.write_raw(name.as_bytes());
}

fn write_payload(w: &mut WriteBuf, tag: &Tag) {
    match tag {
        Tag::Byte(v) => w.write_i8(*v),
        Tag::Short(v) => w.write_i16(*v),
        Tag::Int(v) => w.write_i32(*v),
        Tag::Long(v) => w.write_i64(*v),
        Tag::Float(v) => w.write_f32(*v),
        Tag::Double(v) => w.write_f64(*v),
        Tag::ByteArray(v) => {
            w.write_i32(v.len() as i32);
            w.write_raw(v);
        }
        Tag::String(v) => {
            w.write_u16(v.len() as u16);
            w.write_raw(v.as_bytes());
        }
        Tag::List(items) => {
            let elem_type = items.first().map_or(TAG_END, Tag::type_id);
            w.write_u8(elem_type);
            w.write_i32(items.len() as i32);
            for item in items {
                write_payload(w, item);
            }
        }
        Tag::Compound(entries) => {
            for (name, child) in entries {
                w.write_u8(child.type_id());
                write_name(w, name);
                write_payload(w, child);
            }
            w.write_u8(TAG_END);
        }
        Tag::IntArray(v) => {
            w.write_i32(v.len() as i32);
            for item in v {
                w.write_i32(*item);
            }
        }
        Tag::LongArray(v) => {
            w.write_i32(v.len() as i32);
            for item in v {
                w.write_i64(*item);
            }
        }
    }
}

/// Write a named root tag: type byte, name, payload.
pub fn write_named(w: &mut WriteBuf, name: &str, tag: &Tag) {
    w.write_u8(tag.type_id());
    write_name(w, name);
    write_payload(w, tag);
}

/// Write a root compound with an empty name, the usual packet embedding.
pub fn write_root(w: &mut WriteBuf, tag: &Tag) {
    write_named(w, "", tag);
}

/// Write the canonical empty document: a lone `TAG_End` byte.
pub fn write_empty(w: &mut WriteBuf) {
    w.write_u8(TAG_END);
}

fn read_name(r: &mut ReadBuf<'_>) -> Result<String, CodecError> {
    let len = r.read_u16()? as usize;
    let raw = r.read_raw(len)?;
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|_| CodecError::Malformed("nbt name utf-8"))
}

fn read_payload(r: &mut ReadBuf<'_>, type_id: u8, depth: u32) -> Result<Tag, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::Malformed("nbt nesting too deep"));
    }

    Ok(match type_id {
        TAG_BYTE => Tag::Byte(r.read_i8()?),
        TAG_SHORT => Tag::Short(r.read_i16()?),
        TAG_INT => Tag::Int(r.read_i32()?),
        TAG_LONG => Tag::Long(r.read_i64()?),
        TAG_FLOAT => Tag::Float(r.read_f32()?),
        TAG_DOUBLE => Tag::Double(r.read_f64()?),
        TAG_BYTE_ARRAY => {
            let len = read_len(r)?;
            Tag::ByteArray(r.read_raw(len)?.to_vec())
        }
        TAG_STRING => {
            let len = r.read_u16()? as usize;
            let raw = r.read_raw(len)?;
            let s = std::str::from_utf8(raw)
                .map_err(|_| CodecError::Malformed("nbt string utf-8"))?;
            Tag::String(s.to_string())
        }
        TAG_LIST => {
            let elem_type = r.read_u8()?;
            let len = read_len(r)?;
            if elem_type == TAG_END && len > 0 {
                return Err(CodecError::Malformed("nbt list of TAG_End"));
            }
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_payload(r, elem_type, depth + 1)?);
            }
            Tag::List(items)
        }
        TAG_COMPOUND => {
            let mut entries = Vec::new();
            loop {
                let child_type = r.read_u8()?;
                if child_type == TAG_END {
                    break;
                }
                let name = read_name(r)?;
                let child = read_payload(r, child_type, depth + 1)?;
                entries.push((name, child));
            }
            Tag::Compound(entries)
        }
        TAG_INT_ARRAY => {
            let len = read_len(r)?;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(r.read_i32()?);
            }
            Tag::IntArray(items)
        }
        TAG_LONG_ARRAY => {
            let len = read_len(r)?;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(r.read_i64()?);
            }
            Tag::LongArray(items)
        }
        _ => return Err(CodecError::Malformed("nbt tag type")),
    })
}

fn read_len(r: &mut ReadBuf<'_>) -> Result<usize, CodecError> {
    let len = r.read_i32()?;
    if len < 0 {
        return Err(CodecError::Malformed("negative nbt length"));
    }
    Ok(len as usize)
}

/// Read a named root tag. A lone `TAG_End` yields `None` (the empty
/// document, as item stacks use it).
pub fn read_named(r: &mut ReadBuf<'_>) -> Result<Option<(String, Tag)>, CodecError> {
    let type_id = r.read_u8()?;
    if type_id == TAG_END {
        return Ok(None);
    }
    let name = read_name(r)?;
    let tag = read_payload(r, type_id, 0)?;
    Ok(Some((name, tag)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_pool::BufferPool;

    fn encode(tag: &Tag) -> Vec<u8> {
        let pool = BufferPool::new();
        let mut w = WriteBuf::new(&pool);
        write_root(&mut w, tag);
        w.as_slice().to_vec()
    }

    #[test]
    fn test_empty_compound_bytes() {
        // TAG_Compound, empty name, TAG_End.
        let encoded = encode(&Tag::Compound(vec![]));
        assert_eq!(encoded, [0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let tag = Tag::compound(vec![
            ("zulu", Tag::Byte(1)),
            ("alpha", Tag::Int(-7)),
            ("mid", Tag::String("hello".to_string())),
        ]);

        let encoded = encode(&tag);
        let mut r = ReadBuf::new(&encoded);
        let (name, decoded) = read_named(&mut r).unwrap().unwrap();
        assert_eq!(name, "");
        assert_eq!(decoded, tag);
        assert!(r.is_empty());
    }

    #[test]
    fn test_nested_structures() {
        let tag = Tag::compound(vec![
            (
                "levels",
                Tag::List(vec![Tag::Short(3), Tag::Short(5), Tag::Short(8)]),
            ),
            (
                "inner",
                Tag::compound(vec![
                    ("longs", Tag::LongArray(vec![i64::MIN, 0, i64::MAX])),
                    ("ints", Tag::IntArray(vec![-1, 0, 1])),
                    ("raw", Tag::ByteArray(vec![0xDE, 0xAD])),
                ]),
            ),
            ("scale", Tag::Double(0.5)),
        ]);

        let encoded = encode(&tag);
        let mut r = ReadBuf::new(&encoded);
        let (_, decoded) = read_named(&mut r).unwrap().unwrap();
        assert_eq!(decoded, tag);
    }

    #[test]
    fn test_empty_document_reads_as_none() {
        let mut r = ReadBuf::new(&[0x00]);
        assert!(read_named(&mut r).unwrap().is_none());
    }

    #[test]
    fn test_unknown_tag_type_is_malformed() {
        let mut r = ReadBuf::new(&[0x0D, 0x00, 0x00]);
        assert!(matches!(read_named(&mut r), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_depth_bomb_is_malformed() {
        // A compound nested past MAX_DEPTH.
        let mut bytes = Vec::new();
        for _ in 0..40 {
            bytes.push(TAG_COMPOUND);
            bytes.extend_from_slice(&[0x00, 0x01, b'x']);
        }
        let mut r = ReadBuf::new(&bytes);
        assert!(read_named(&mut r).is_err());
    }

    #[test]
    fn test_get_child() {
        let tag = Tag::compound(vec![("health", Tag::Float(20.0))]);
        assert_eq!(tag.get("health"), Some(&Tag::Float(20.0)));
        assert_eq!(tag.get("missing"), None);
    }
}
