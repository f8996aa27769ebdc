//! Sidecar encoding of the forward index.

use super::forward_index::{ForwardIndex, ValueMap};
use crate::error::{Result, StubIndexError};
use crate::id_list::CompactIdList;
use stubscope_api::models::{IndexKey, IndexValue};
use stubscope_plugin::CodecError;
use stubscope_plugin::varint::{decode_varint, encode_varint, zigzag_decode, zigzag_encode};

pub trait ForwardIndexCodec: Send + Sync {
    /// Identifies the encoding; equal ids mean sidecar bytes are interchangeable.
    fn codec_id(&self) -> &str;

    fn encode(&self, index: &ForwardIndex) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<ForwardIndex>;
}

/// `varint(keys) | (utf key, varint(values), (varint len, msgpack value, id list)*)*`,
/// keys and values in sorted order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryIndexCodec;

const EMPTY_LIST: i64 = i32::MAX as i64;

impl BinaryIndexCodec {
    pub const ID: &'static str = "stubscope.binary-index.v1";

    pub fn new() -> Self {
        Self
    }
}

impl ForwardIndexCodec for BinaryIndexCodec {
    fn codec_id(&self) -> &str {
        Self::ID
    }

    fn encode(&self, index: &ForwardIndex) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut keys: Vec<&IndexKey> = index.keys().collect();
        keys.sort();

        encode_varint(keys.len() as u64, &mut buf);
        for key in keys {
            write_str(key.as_str(), &mut buf);
            write_values(&index[key], &mut buf)?;
        }
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<ForwardIndex> {
        let mut pos = 0;
        let key_count = decode_varint(bytes, &mut pos)? as usize;
        let mut index = ForwardIndex::with_capacity(key_count.min(1024));
        for _ in 0..key_count {
            let key = IndexKey::new(read_str(bytes, &mut pos)?);
            let values = read_values(bytes, &mut pos)?;
            index.insert(key, values);
        }
        if pos != bytes.len() {
            return Err(malformed("trailing bytes after forward index"));
        }
        Ok(index)
    }
}

fn write_values(values: &ValueMap, buf: &mut Vec<u8>) -> Result<()> {
    let mut entries: Vec<(&IndexValue, &CompactIdList)> = values.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    encode_varint(entries.len() as u64, buf);
    for (value, ids) in entries {
        let encoded = rmp_serde::to_vec(value)?;
        encode_varint(encoded.len() as u64, buf);
        buf.extend_from_slice(&encoded);
        write_ids(ids, buf);
    }
    Ok(())
}

fn read_values(bytes: &[u8], pos: &mut usize) -> Result<ValueMap> {
    let count = decode_varint(bytes, pos)? as usize;
    let mut values = ValueMap::with_capacity(count.min(1024));
    for _ in 0..count {
        let len = decode_varint(bytes, pos)? as usize;
        let slice = take(bytes, pos, len)?;
        let value: IndexValue = rmp_serde::from_slice(slice)?;
        values.insert(value, read_ids(bytes, pos)?);
    }
    Ok(values)
}

/// Empty lists are a marker, single entries are written bare and longer
/// lists as `-len` followed by the entries.
fn write_ids(ids: &CompactIdList, buf: &mut Vec<u8>) {
    match ids.len() {
        0 => encode_varint(zigzag_encode(EMPTY_LIST), buf),
        1 if ids.get(0) >= 0 && (ids.get(0) as i64) != EMPTY_LIST => {
            encode_varint(zigzag_encode(ids.get(0) as i64), buf)
        }
        len => {
            encode_varint(zigzag_encode(-(len as i64)), buf);
            for id in ids.iter() {
                encode_varint(zigzag_encode(id as i64), buf);
            }
        }
    }
}

fn read_ids(bytes: &[u8], pos: &mut usize) -> Result<CompactIdList> {
    let head = zigzag_decode(decode_varint(bytes, pos)?);
    if head == EMPTY_LIST {
        return Ok(CompactIdList::new());
    }
    if head >= 0 {
        return Ok([narrow(head)?].as_slice().into());
    }
    let len = head.unsigned_abs() as usize;
    let mut ids = CompactIdList::with_capacity(len.min(1 << 16));
    for _ in 0..len {
        ids.add(narrow(zigzag_decode(decode_varint(bytes, pos)?))?);
    }
    ids.trim_to_size();
    Ok(ids)
}

fn narrow(value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| malformed(&format!("stub id {} out of range", value)))
}

fn write_str(s: &str, buf: &mut Vec<u8>) {
    encode_varint(s.len() as u64, buf);
    buf.extend_from_slice(s.as_bytes());
}

fn read_str<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a str> {
    let len = decode_varint(bytes, pos)? as usize;
    let slice = take(bytes, pos, len)?;
    std::str::from_utf8(slice).map_err(|_| CodecError::InvalidUtf8.into())
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
    let slice = bytes.get(*pos..end).ok_or(CodecError::UnexpectedEof)?;
    *pos = end;
    Ok(slice)
}

fn malformed(msg: &str) -> StubIndexError {
    CodecError::Malformed(msg.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ForwardIndex {
        let mut by_name = ValueMap::new();
        by_name.insert(IndexValue::from("foo"), [0].as_slice().into());
        by_name.insert(IndexValue::from("bar"), [1, 4, 70_000].as_slice().into());
        by_name.insert(IndexValue::from("empty"), CompactIdList::new());
        let mut by_arity = ValueMap::new();
        by_arity.insert(IndexValue::Int(2), [3].as_slice().into());
        by_arity.insert(IndexValue::Int(-1), [i32::MAX].as_slice().into());

        let mut index = ForwardIndex::new();
        index.insert(IndexKey::new("byName"), by_name);
        index.insert(IndexKey::new("byArity"), by_arity);
        index
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = BinaryIndexCodec::new();
        let a = codec.encode(&sample()).unwrap();
        let b = codec.encode(&sample()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_restores_index() {
        let codec = BinaryIndexCodec::new();
        let bytes = codec.encode(&sample()).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_single_entry_uses_bare_form() {
        let mut buf = Vec::new();
        write_ids(&[5].as_slice().into(), &mut buf);
        assert_eq!(buf, vec![10]);
    }

    #[test]
    fn test_truncated_sidecar_fails() {
        let codec = BinaryIndexCodec::new();
        let bytes = codec.encode(&sample()).unwrap();
        assert!(codec.decode(&bytes[..bytes.len() - 1]).is_err());
    }
}
