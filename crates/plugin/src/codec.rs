//! Byte streams handed to stub serializers.

use crate::error::CodecError;
use crate::interner::{NameEnumerator, StringInterner};
use crate::varint::{decode_varint, encode_varint, zigzag_decode, zigzag_encode};
use std::sync::Arc;

pub struct StubOutput<'a> {
    buf: &'a mut Vec<u8>,
    names: &'a dyn NameEnumerator,
}

impl<'a> StubOutput<'a> {
    pub fn new(buf: &'a mut Vec<u8>, names: &'a dyn NameEnumerator) -> Self {
        Self { buf, names }
    }

    pub fn write_varint(&mut self, value: u64) {
        encode_varint(value, self.buf);
    }

    pub fn write_i64(&mut self, value: i64) {
        encode_varint(zigzag_encode(value), self.buf);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Inline UTF-8, length prefixed.
    pub fn write_utf(&mut self, s: &str) {
        encode_varint(s.len() as u64, self.buf);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Dictionary-backed name; `None` is written as id 0.
    pub fn write_name(&mut self, name: Option<&str>) -> Result<(), CodecError> {
        let id = match name {
            Some(name) => self.names.enumerate(name).map_err(CodecError::Names)?,
            None => 0,
        };
        encode_varint(id as u64, self.buf);
        Ok(())
    }
}

pub struct StubInput<'a> {
    buf: &'a [u8],
    pos: usize,
    names: &'a dyn NameEnumerator,
    interner: &'a dyn StringInterner,
}

impl<'a> StubInput<'a> {
    pub fn new(
        buf: &'a [u8],
        names: &'a dyn NameEnumerator,
        interner: &'a dyn StringInterner,
    ) -> Self {
        Self {
            buf,
            pos: 0,
            names,
            interner,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        decode_varint(self.buf, &mut self.pos)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| CodecError::Malformed(format!("{} exceeds u32", value)))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        let byte = *self.buf.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::Malformed(format!("bool byte {}", other))),
        }
    }

    pub fn read_utf(&mut self) -> Result<Arc<str>, CodecError> {
        let len = self.read_varint()? as usize;
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self.buf.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        self.pos = end;
        Ok(self.interner.intern(s))
    }

    pub fn read_name(&mut self) -> Result<Option<Arc<str>>, CodecError> {
        let id = self.read_u32()?;
        if id == 0 {
            return Ok(None);
        }
        let name = self
            .names
            .value_of(id)
            .map_err(CodecError::Names)?
            .ok_or(CodecError::UnknownName(id))?;
        Ok(Some(self.interner.intern(&name)))
    }
}
