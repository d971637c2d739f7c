//! Reply values
//!
//! Decodes reply payloads into host values.
//!
//! ## KVAL Payload Layout
//! ```text
//! ┌───────────┬──────────────────────────────────────────────────────────┐
//! │ Count (4) │ Entry * Count                                            │
//! └───────────┴──────────────────────────────────────────────────────────┘
//!
//! Entry:
//! ┌────────────┬───────────┬─────────┬────────────┬──────────────┐
//! │ KeyLen (4) │ Key       │ Enc (1) │ ValLen (4) │ Value        │
//! └────────────┴───────────┴─────────┴────────────┴──────────────┘
//! ```

use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;

use super::{Encoding, ReplyCode, ReplyHeader};
use crate::error::{DecodeError, GibsonError, Result};

/// A decoded reply value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// OK reply, no data
    Null,

    /// Plain data, passed through untouched (normally UTF-8 text)
    Plain(Bytes),

    /// LZF-compressed data, passed through undecoded
    Compressed(Bytes),

    /// Signed integer (32 or 64 bit on the wire)
    Number(i64),

    /// Key => value map, in wire order
    Map(ValueMap),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Plain data as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Plain(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Raw bytes of plain or compressed data
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Plain(b) | Value::Compressed(b) => Some(&b[..]),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("OK"),
            Value::Plain(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Compressed(b) => write!(f, "<lzf {} bytes>", b.len()),
            Value::Number(n) => write!(f, "{}", n),
            Value::Map(m) => {
                for (i, (key, value)) in m.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{} : {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

/// Insertion-ordered map of text keys to values
///
/// Re-inserting a key replaces its value in place, keeping the position
/// of the first occurrence. Equality compares entries in order.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: IndexMap<String, Value>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.iter().eq(other.entries.iter())
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a complete reply frame into the caller-facing result
///
/// Error codes become `GibsonError::Server` (any payload is discarded),
/// unknown codes and malformed payloads become `GibsonError::Decode`.
pub fn decode_reply(header: &ReplyHeader, payload: &[u8]) -> Result<Value> {
    let code = ReplyCode::from_u16(header.code)
        .ok_or(DecodeError::UnknownReplyCode(header.code))?;

    if let Some(err) = code.server_error() {
        return Err(GibsonError::Server(err));
    }

    Ok(decode_value(code, header.encoding, payload)?)
}

/// Decode a success payload
///
/// `payload` is exactly the reply's data; its length is the value size.
/// Error codes carry no value and decode to `Value::Null`.
pub fn decode_value(
    code: ReplyCode,
    encoding: u8,
    payload: &[u8],
) -> std::result::Result<Value, DecodeError> {
    match code {
        ReplyCode::Val => decode_scalar(encoding, payload),
        ReplyCode::KVal => decode_map(payload),
        _ => Ok(Value::Null),
    }
}

fn decode_scalar(encoding: u8, payload: &[u8]) -> std::result::Result<Value, DecodeError> {
    match Encoding::from_u8(encoding) {
        Some(Encoding::Plain) => Ok(Value::Plain(Bytes::copy_from_slice(payload))),
        Some(Encoding::Lzf) => Ok(Value::Compressed(Bytes::copy_from_slice(payload))),
        Some(Encoding::Number) => decode_number(payload),
        None => Err(DecodeError::UnknownEncoding(encoding)),
    }
}

fn decode_number(payload: &[u8]) -> std::result::Result<Value, DecodeError> {
    match *payload {
        [b0, b1, b2, b3] => Ok(Value::Number(i32::from_le_bytes([b0, b1, b2, b3]) as i64)),
        [b0, b1, b2, b3, b4, b5, b6, b7] => Ok(Value::Number(i64::from_le_bytes([
            b0, b1, b2, b3, b4, b5, b6, b7,
        ]))),
        _ => Err(DecodeError::InvalidNumberSize(payload.len())),
    }
}

fn decode_map(payload: &[u8]) -> std::result::Result<Value, DecodeError> {
    let mut cursor = Cursor::new(payload);
    let count = cursor.read_u32()? as usize;

    // Each entry takes at least 9 bytes, so a bogus count cannot force a
    // huge allocation.
    let mut map = ValueMap::with_capacity(count.min(cursor.remaining() / 9));

    for _ in 0..count {
        let key_len = cursor.read_u32()? as usize;
        let key = String::from_utf8_lossy(cursor.take(key_len)?).into_owned();
        let encoding = cursor.read_u8()?;
        let size = cursor.read_u32()? as usize;
        let data = cursor.take(size)?;

        let value = decode_value(ReplyCode::Val, encoding, data)?;
        map.insert(key, value);
    }

    Ok(Value::Map(map))
}

/// Read position over an immutable payload
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::TruncatedMap {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> std::result::Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> std::result::Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
