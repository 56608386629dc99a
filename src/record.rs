//! Tagged-record decoder for the self-describing `.toc` record tree.
//!
//! # On-disk grammar
//!
//! A record starts with a 1-byte type tag:
//!
//! ```text
//! Tag    Shape
//! 0x82   Anonymous composite: LEB128 byte length, then fields until consumed
//! 0x02   Named composite: NUL-terminated name, LEB128 byte length, fields
//! 0x87   Inline blob: LEB128 (n+1), n payload bytes, mandatory 0x00
//! 0x8f   Fixed 16-byte blob (GUID)
//! ```
//!
//! Inside a composite each field starts with a 1-byte field tag (`0x00` ends
//! the field list) followed by a NUL-terminated field name and a payload:
//!
//! ```text
//! Tag    Payload
//! 0x0f   16 raw bytes (GUID)
//! 0x09   u64 little-endian
//! 0x08   u32 little-endian
//! 0x06   1 byte, boolean (== 0x01)
//! 0x02   nested composite — rewind to the field's first byte and recurse
//!        (the nested record re-reads the tag and the name)
//! 0x13   LEB128 length, then raw bytes
//! 0x10   20 raw bytes (SHA-1)
//! 0x07   LEB128 (n+1), n bytes UTF-8, then 1 terminator byte
//! 0x0c   u64 big-endian
//! 0x01   list of composites: LEB128 (bytes+1), records until bytes-1
//!        consumed, mandatory 0x00
//! ```
//!
//! Any other tag aborts the parse. The decoded tree is dynamically shaped;
//! consumers do exact key lookups through the typed accessors, which fail
//! with [`FormatError::TypeMismatch`] instead of panicking. Field order is
//! preserved as read. A duplicate key within one composite shadows the
//! earlier value (the formats do not produce duplicates in practice).
//!
//! Blob-shaped records (`0x87`, `0x8f`) surface their payload as a single
//! field named `data`, so lookups stay uniform across record shapes.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{self, SeekFrom};

use crate::error::FormatError;
use crate::stream::FrostbiteRead;

// ── Value ────────────────────────────────────────────────────────────────────

/// One decoded field payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Guid([u8; 16]),
    U64(u64),
    U32(u32),
    Bool(bool),
    Record(Record),
    Blob(Vec<u8>),
    Sha1([u8; 20]),
    String(String),
    U64Be(u64),
    List(Vec<Record>),
}

impl Value {
    /// Shape name used in `TypeMismatch` diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Guid(_)   => "guid",
            Value::U64(_)    => "u64",
            Value::U32(_)    => "u32",
            Value::Bool(_)   => "bool",
            Value::Record(_) => "record",
            Value::Blob(_)   => "blob",
            Value::Sha1(_)   => "sha1",
            Value::String(_) => "string",
            Value::U64Be(_)  => "u64-be",
            Value::List(_)   => "list",
        }
    }
}

// ── Record ───────────────────────────────────────────────────────────────────

/// A decoded record: named fields in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Parse one record from the current stream position.
    pub fn parse<R: FrostbiteRead>(reader: &mut R) -> Result<Self, FormatError> {
        let offset = reader.stream_position()?;
        let tag = reader.read_u8()?;
        match tag {
            0x82 | 0x02 => {
                if tag == 0x02 {
                    // Record-level name; carried on disk, unused by consumers.
                    reader.read_cstring()?;
                }
                let size = reader.read_leb128()?;
                let origin = reader.stream_position()?;
                let mut fields = Vec::new();
                while reader.stream_position()? - origin < size {
                    if let Some(field) = read_field(reader)? {
                        fields.push(field);
                    }
                }
                Ok(Record { fields })
            }
            0x87 => {
                let len = reader.read_leb128()?.saturating_sub(1);
                let data = reader.read_block(len as usize)?;
                expect_terminator(reader)?;
                Ok(Record {
                    fields: vec![("data".to_owned(), Value::Blob(data))],
                })
            }
            0x8f => Ok(Record {
                fields: vec![("data".to_owned(), Value::Guid(reader.read_array()?))],
            }),
            other => Err(FormatError::UnknownItemTag { offset, tag: other }),
        }
    }

    /// Parse a single free-standing field (tag, name, payload) into a record.
    ///
    /// Bundle manifests carry their chunk metadata this way: one field,
    /// outside any composite framing.
    pub fn parse_single_field<R: FrostbiteRead>(reader: &mut R) -> Result<Self, FormatError> {
        let mut fields = Vec::new();
        if let Some(field) = read_field(reader)? {
            fields.push(field);
        }
        Ok(Record { fields })
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Exact-name lookup; the latest write wins on duplicate keys.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Field names in source order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn required(&self, name: &str) -> Result<&Value, FormatError> {
        self.get(name)
            .ok_or_else(|| FormatError::MissingField(name.to_owned()))
    }

    fn mismatch(name: &str, expected: &'static str, value: &Value) -> FormatError {
        FormatError::TypeMismatch {
            field:    name.to_owned(),
            expected,
            actual:   value.kind(),
        }
    }

    // ── Typed accessors ──────────────────────────────────────────────────────

    pub fn guid(&self, name: &str) -> Result<&[u8; 16], FormatError> {
        match self.required(name)? {
            Value::Guid(g) => Ok(g),
            other          => Err(Self::mismatch(name, "guid", other)),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str, FormatError> {
        match self.required(name)? {
            Value::String(s) => Ok(s),
            other            => Err(Self::mismatch(name, "string", other)),
        }
    }

    pub fn blob(&self, name: &str) -> Result<&[u8], FormatError> {
        match self.required(name)? {
            Value::Blob(b) => Ok(b),
            other          => Err(Self::mismatch(name, "blob", other)),
        }
    }

    pub fn u32(&self, name: &str) -> Result<u32, FormatError> {
        match self.required(name)? {
            Value::U32(v) => Ok(*v),
            other         => Err(Self::mismatch(name, "u32", other)),
        }
    }

    /// Optional u32: absent fields are `None`, wrong shapes are errors.
    pub fn u32_opt(&self, name: &str) -> Result<Option<u32>, FormatError> {
        match self.get(name) {
            None                => Ok(None),
            Some(Value::U32(v)) => Ok(Some(*v)),
            Some(other)         => Err(Self::mismatch(name, "u32", other)),
        }
    }

    pub fn record(&self, name: &str) -> Result<&Record, FormatError> {
        match self.required(name)? {
            Value::Record(r) => Ok(r),
            other            => Err(Self::mismatch(name, "record", other)),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[Record], FormatError> {
        match self.required(name)? {
            Value::List(items) => Ok(items),
            other              => Err(Self::mismatch(name, "list", other)),
        }
    }

    /// Optional list: an absent field reads as empty.
    pub fn list_or_empty(&self, name: &str) -> Result<&[Record], FormatError> {
        match self.get(name) {
            None                    => Ok(&[]),
            Some(Value::List(items)) => Ok(items),
            Some(other)             => Err(Self::mismatch(name, "list", other)),
        }
    }
}

// ── Field parsing ────────────────────────────────────────────────────────────

fn read_field<R: FrostbiteRead>(
    reader: &mut R,
) -> Result<Option<(String, Value)>, FormatError> {
    let offset = reader.stream_position()?;
    let tag = reader.read_u8()?;
    if tag == 0x00 {
        return Ok(None);
    }

    let key = reader.read_cstring()?;
    let value = match tag {
        0x0f => Value::Guid(reader.read_array()?),
        0x09 => Value::U64(reader.read_u64::<LittleEndian>()?),
        0x08 => Value::U32(reader.read_u32::<LittleEndian>()?),
        0x06 => Value::Bool(reader.read_u8()? == 0x01),
        0x02 => {
            // The nested record re-reads the tag and the name.
            reader.seek(SeekFrom::Start(offset))?;
            Value::Record(Record::parse(reader)?)
        }
        0x13 => {
            let len = reader.read_leb128()?;
            Value::Blob(reader.read_block(len as usize)?)
        }
        0x10 => Value::Sha1(reader.read_array()?),
        0x07 => {
            let len = reader.read_leb128()?.saturating_sub(1);
            let raw = reader.read_block(len as usize)?;
            let text = String::from_utf8(raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            reader.seek(SeekFrom::Current(1))?;
            Value::String(text)
        }
        0x0c => Value::U64Be(reader.read_u64::<BigEndian>()?),
        0x01 => {
            let list_size = reader.read_leb128()?;
            let origin = reader.stream_position()?;
            let mut items = Vec::new();
            while reader.stream_position()? - origin < list_size.saturating_sub(1) {
                items.push(Record::parse(reader)?);
            }
            expect_terminator(reader)?;
            Value::List(items)
        }
        other => return Err(FormatError::UnknownFieldTag { offset, tag: other }),
    };

    Ok(Some((key, value)))
}

fn expect_terminator<R: FrostbiteRead>(reader: &mut R) -> Result<(), FormatError> {
    let offset = reader.stream_position()?;
    if reader.read_u8()? != 0x00 {
        return Err(FormatError::MissingTerminator { offset });
    }
    Ok(())
}
