//! Typed database values, schemas, and tuples.
//!
//! [`Value`] is the tagged union every layer of the engine trades in: the
//! evaluator computes over it, the heap serializes it, the B-tree derives
//! index keys from it. Values own their contents and copy deeply.
//!
//! The on-disk encoding is self-describing: one tag byte (the stable
//! [`ValueKind`] code) followed by the body, with variable-width bodies
//! length-prefixed. A delimited text form is deliberately not used because
//! it corrupts on values containing the delimiter.

mod error;
mod schema;
mod tuple;

pub use error::{SerializationError, TypeError};
pub use schema::{Column, Schema};
pub use tuple::{Tuple, TupleId};

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::Decimal;

/// The concrete type of a [`Value`], with its stable on-disk tag code.
///
/// Codes must never be reassigned; they are written into heap pages and
/// index files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Null = 0,
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    Float32 = 6,
    Float64 = 7,
    Decimal = 8,
    Char = 9,
    Varchar = 10,
    Text = 11,
    Date = 12,
    Time = 13,
    Timestamp = 14,
    Json = 15,
    Blob = 16,
}

impl ValueKind {
    /// Decodes a tag byte back into a kind.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ValueKind::Null,
            1 => ValueKind::Bool,
            2 => ValueKind::Int8,
            3 => ValueKind::Int16,
            4 => ValueKind::Int32,
            5 => ValueKind::Int64,
            6 => ValueKind::Float32,
            7 => ValueKind::Float64,
            8 => ValueKind::Decimal,
            9 => ValueKind::Char,
            10 => ValueKind::Varchar,
            11 => ValueKind::Text,
            12 => ValueKind::Date,
            13 => ValueKind::Time,
            14 => ValueKind::Timestamp,
            15 => ValueKind::Json,
            16 => ValueKind::Blob,
            _ => return None,
        })
    }

    /// Returns the tag code written to disk.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns true for the integer kinds.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueKind::Int8 | ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64
        )
    }

    /// Returns true for any numeric kind (integer, float, or decimal).
    pub fn is_numeric(self) -> bool {
        self.is_integer()
            | matches!(
                self,
                ValueKind::Float32 | ValueKind::Float64 | ValueKind::Decimal
            )
    }

    /// Returns true for the string kinds.
    pub fn is_string(self) -> bool {
        matches!(self, ValueKind::Char | ValueKind::Varchar | ValueKind::Text)
    }

    /// The SQL spelling of this kind, as used in error messages.
    pub fn sql_name(self) -> &'static str {
        match self {
            ValueKind::Null => "NULL",
            ValueKind::Bool => "BOOLEAN",
            ValueKind::Int8 => "TINYINT",
            ValueKind::Int16 => "SMALLINT",
            ValueKind::Int32 => "INTEGER",
            ValueKind::Int64 => "BIGINT",
            ValueKind::Float32 => "REAL",
            ValueKind::Float64 => "DOUBLE PRECISION",
            ValueKind::Decimal => "DECIMAL",
            ValueKind::Char => "CHAR",
            ValueKind::Varchar => "VARCHAR",
            ValueKind::Text => "TEXT",
            ValueKind::Date => "DATE",
            ValueKind::Time => "TIME",
            ValueKind::Timestamp => "TIMESTAMP",
            ValueKind::Json => "JSON",
            ValueKind::Blob => "BLOB",
        }
    }
}

/// A typed database value.
///
/// Date is days since the Unix epoch, Time is microseconds since midnight,
/// Timestamp is microseconds since the Unix epoch. These are logical values;
/// the engine never consults a wall clock to interpret them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL (no concrete type).
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Exact decimal, for money-like columns.
    Decimal(Decimal),
    /// Fixed-width character data (padding is the caller's concern).
    Char(String),
    Varchar(String),
    Text(String),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    Json(serde_json::Value),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int8(_) => ValueKind::Int8,
            Value::Int16(_) => ValueKind::Int16,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Char(_) => ValueKind::Char,
            Value::Varchar(_) => ValueKind::Varchar,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Json(_) => ValueKind::Json,
            Value::Blob(_) => ValueKind::Blob,
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Maps this value to a boolean for filtering purposes.
    ///
    /// Returns `None` for NULL so callers decide how NULL filters
    /// (Filter and HAVING treat it as false; arithmetic preserves it).
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widens any integer value to i64, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(n) => Some(*n as i64),
            Value::Int16(n) => Some(*n as i64),
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Widens any numeric value to f64, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(n) => Some(*n as f64),
            Value::Float64(n) => Some(*n),
            Value::Decimal(d) => {
                use rust_decimal::prelude::ToPrimitive;
                d.to_f64()
            }
            _ => self.as_i64().map(|n| n as f64),
        }
    }

    /// Converts any numeric value to an exact decimal, if it is one.
    pub fn as_decimal(&self) -> Option<Decimal> {
        use rust_decimal::prelude::FromPrimitive;
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Float32(n) => Decimal::from_f32(*n),
            Value::Float64(n) => Decimal::from_f64(*n),
            _ => self.as_i64().map(Decimal::from),
        }
    }

    /// Borrows the string payload of any string-kinded value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Char(s) | Value::Varchar(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Compares two values.
    ///
    /// Comparison against NULL yields `None` (three-valued logic), as does
    /// comparison between incompatible families. Within the numeric family
    /// values promote before comparing; string kinds compare by content.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }

        // Numeric family: promote to the widest representation present.
        if self.kind().is_numeric() && other.kind().is_numeric() {
            if matches!(self, Value::Decimal(_)) || matches!(other, Value::Decimal(_)) {
                // Decimal dominates so exact values stay exact.
                return Some(self.as_decimal()?.cmp(&other.as_decimal()?));
            }
            if self.kind().is_integer() && other.kind().is_integer() {
                return Some(self.as_i64()?.cmp(&other.as_i64()?));
            }
            return Some(self.as_f64()?.total_cmp(&other.as_f64()?));
        }

        if self.kind().is_string() && other.kind().is_string() {
            return Some(self.as_str()?.cmp(other.as_str()?));
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Coerces this value to a column kind, widening or narrowing as needed.
    ///
    /// Used when binding INSERT/UPDATE values to a column. NULL coerces to
    /// anything (nullability is checked separately).
    pub fn coerce_to(&self, kind: ValueKind) -> Result<Value, TypeError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if self.kind() == kind {
            return Ok(self.clone());
        }

        let fail = || TypeError::Incompatible {
            from: self.kind(),
            to: kind,
        };

        match kind {
            ValueKind::Int8 => self
                .as_i64()
                .and_then(|n| i8::try_from(n).ok())
                .map(Value::Int8)
                .ok_or_else(fail),
            ValueKind::Int16 => self
                .as_i64()
                .and_then(|n| i16::try_from(n).ok())
                .map(Value::Int16)
                .ok_or_else(fail),
            ValueKind::Int32 => self
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int32)
                .ok_or_else(fail),
            ValueKind::Int64 => self.as_i64().map(Value::Int64).ok_or_else(fail),
            ValueKind::Float32 => self
                .as_f64()
                .map(|n| Value::Float32(n as f32))
                .ok_or_else(fail),
            ValueKind::Float64 => self.as_f64().map(Value::Float64).ok_or_else(fail),
            ValueKind::Decimal => self.as_decimal().map(Value::Decimal).ok_or_else(fail),
            ValueKind::Char => self
                .as_str()
                .map(|s| Value::Char(s.to_string()))
                .ok_or_else(fail),
            ValueKind::Varchar => self
                .as_str()
                .map(|s| Value::Varchar(s.to_string()))
                .ok_or_else(fail),
            ValueKind::Text => self
                .as_str()
                .map(|s| Value::Text(s.to_string()))
                .ok_or_else(fail),
            ValueKind::Bool => match self {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                _ => Err(fail()),
            },
            ValueKind::Date => self
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Date)
                .ok_or_else(fail),
            ValueKind::Time => self.as_i64().map(Value::Time).ok_or_else(fail),
            ValueKind::Timestamp => self.as_i64().map(Value::Timestamp).ok_or_else(fail),
            ValueKind::Json => match self {
                Value::Text(s) | Value::Varchar(s) | Value::Char(s) => {
                    serde_json::from_str(s).map(Value::Json).map_err(|_| fail())
                }
                _ => Err(fail()),
            },
            ValueKind::Blob => match self {
                Value::Blob(b) => Ok(Value::Blob(b.clone())),
                _ => Err(fail()),
            },
            ValueKind::Null => Err(fail()),
        }
    }

    /// Returns the encoded size in bytes (tag byte included).
    pub fn encoded_size(&self) -> usize {
        1 + match self {
            Value::Null => 0,
            Value::Bool(_) | Value::Int8(_) => 1,
            Value::Int16(_) => 2,
            Value::Int32(_) | Value::Float32(_) | Value::Date(_) => 4,
            Value::Int64(_) | Value::Float64(_) | Value::Time(_) | Value::Timestamp(_) => 8,
            Value::Decimal(d) => 4 + d.to_string().len(),
            Value::Char(s) | Value::Varchar(s) | Value::Text(s) => 4 + s.len(),
            Value::Json(j) => 4 + j.to_string().len(),
            Value::Blob(b) => 4 + b.len(),
        }
    }

    /// Appends the self-describing encoding of this value to `out`.
    ///
    /// Layout: tag byte, then the body. Fixed-width bodies are little-endian;
    /// variable-width bodies carry a little-endian u32 length prefix.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kind().code());
        match self {
            Value::Null => {}
            Value::Bool(b) => out.push(*b as u8),
            Value::Int8(n) => out.push(*n as u8),
            Value::Int16(n) => out.extend_from_slice(&n.to_le_bytes()),
            Value::Int32(n) => out.extend_from_slice(&n.to_le_bytes()),
            Value::Int64(n) => out.extend_from_slice(&n.to_le_bytes()),
            Value::Float32(n) => out.extend_from_slice(&n.to_le_bytes()),
            Value::Float64(n) => out.extend_from_slice(&n.to_le_bytes()),
            Value::Date(n) => out.extend_from_slice(&n.to_le_bytes()),
            Value::Time(n) | Value::Timestamp(n) => out.extend_from_slice(&n.to_le_bytes()),
            // Decimal and Json serialize through their canonical text forms,
            // which round-trip exactly.
            Value::Decimal(d) => encode_bytes(out, d.to_string().as_bytes()),
            Value::Char(s) | Value::Varchar(s) | Value::Text(s) => encode_bytes(out, s.as_bytes()),
            Value::Json(j) => encode_bytes(out, j.to_string().as_bytes()),
            Value::Blob(b) => encode_bytes(out, b),
        }
    }

    /// Decodes one value from the front of `buf`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Value, usize), SerializationError> {
        let tag = *buf.first().ok_or(SerializationError::BufferTooSmall {
            required: 1,
            available: 0,
        })?;
        let kind = ValueKind::from_code(tag)
            .ok_or_else(|| SerializationError::InvalidFormat(format!("unknown value tag {tag}")))?;
        let body = &buf[1..];

        let (value, body_len) = match kind {
            ValueKind::Null => (Value::Null, 0),
            ValueKind::Bool => (Value::Bool(*require(body, 0)? != 0), 1),
            ValueKind::Int8 => (Value::Int8(*require(body, 0)? as i8), 1),
            ValueKind::Int16 => (Value::Int16(i16::from_le_bytes(take(body)?)), 2),
            ValueKind::Int32 => (Value::Int32(i32::from_le_bytes(take(body)?)), 4),
            ValueKind::Int64 => (Value::Int64(i64::from_le_bytes(take(body)?)), 8),
            ValueKind::Float32 => (Value::Float32(f32::from_le_bytes(take(body)?)), 4),
            ValueKind::Float64 => (Value::Float64(f64::from_le_bytes(take(body)?)), 8),
            ValueKind::Date => (Value::Date(i32::from_le_bytes(take(body)?)), 4),
            ValueKind::Time => (Value::Time(i64::from_le_bytes(take(body)?)), 8),
            ValueKind::Timestamp => (Value::Timestamp(i64::from_le_bytes(take(body)?)), 8),
            ValueKind::Decimal => {
                let (bytes, len) = decode_bytes(body)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                let d = text
                    .parse::<Decimal>()
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                (Value::Decimal(d), len)
            }
            ValueKind::Char | ValueKind::Varchar | ValueKind::Text => {
                let (bytes, len) = decode_bytes(body)?;
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                let value = match kind {
                    ValueKind::Char => Value::Char(s),
                    ValueKind::Varchar => Value::Varchar(s),
                    _ => Value::Text(s),
                };
                (value, len)
            }
            ValueKind::Json => {
                let (bytes, len) = decode_bytes(body)?;
                let j = serde_json::from_slice(bytes)
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                (Value::Json(j), len)
            }
            ValueKind::Blob => {
                let (bytes, len) = decode_bytes(body)?;
                (Value::Blob(bytes.to_vec()), len)
            }
        };

        Ok((value, 1 + body_len))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "t" } else { "f" }),
            Value::Int8(n) => write!(f, "{n}"),
            Value::Int16(n) => write!(f, "{n}"),
            Value::Int32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::Float32(n) => write!(f, "{n}"),
            Value::Float64(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Char(s) | Value::Varchar(s) | Value::Text(s) => write!(f, "{s}"),
            Value::Date(n) => write!(f, "{n}"),
            Value::Time(n) => write!(f, "{n}"),
            Value::Timestamp(n) => write!(f, "{n}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::Blob(b) => {
                write!(f, "\\x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn decode_bytes(buf: &[u8]) -> Result<(&[u8], usize), SerializationError> {
    let len = u32::from_le_bytes(take::<4>(buf)?) as usize;
    let total = 4 + len;
    if buf.len() < total {
        return Err(SerializationError::BufferTooSmall {
            required: total,
            available: buf.len(),
        });
    }
    Ok((&buf[4..total], total))
}

fn require(buf: &[u8], index: usize) -> Result<&u8, SerializationError> {
    buf.get(index).ok_or(SerializationError::BufferTooSmall {
        required: index + 1,
        available: buf.len(),
    })
}

fn take<const N: usize>(buf: &[u8]) -> Result<[u8; N], SerializationError> {
    buf.get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or(SerializationError::BufferTooSmall {
            required: N,
            available: buf.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_kinds() {
        let values = [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int8(-5),
            Value::Int16(i16::MIN),
            Value::Int32(i32::MAX),
            Value::Int64(i64::MIN),
            Value::Float32(std::f32::consts::PI),
            Value::Float64(std::f64::consts::E),
            Value::Decimal("123.456".parse().unwrap()),
            Value::Char("ab".into()),
            Value::Varchar("hello".into()),
            Value::Text("hello 日本語 🎉".into()),
            Value::Date(19723),
            Value::Time(12 * 3_600_000_000),
            Value::Timestamp(1_700_000_000_000_000),
            Value::Json(serde_json::json!({"a": [1, 2, 3]})),
            Value::Blob(vec![0, 255, 128]),
        ];
        for value in values {
            let mut buf = Vec::new();
            value.encode(&mut buf);
            assert_eq!(buf.len(), value.encoded_size());
            let (decoded, consumed) = Value::decode(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_encoding_survives_delimiters() {
        // The motivating case for a binary encoding: payloads containing
        // any would-be delimiter must round-trip unchanged.
        let value = Value::Text("a|b,c\n'd'\0e".into());
        let mut buf = Vec::new();
        value.encode(&mut buf);
        let (decoded, _) = Value::decode(&buf).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_decode_truncated() {
        let mut buf = Vec::new();
        Value::Int64(42).encode(&mut buf);
        assert!(matches!(
            Value::decode(&buf[..5]),
            Err(SerializationError::BufferTooSmall { .. })
        ));
        assert!(matches!(
            Value::decode(&[]),
            Err(SerializationError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_tag() {
        assert!(matches!(
            Value::decode(&[200, 0, 0]),
            Err(SerializationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_compare_numeric_promotion() {
        assert_eq!(
            Value::Int16(3).compare(&Value::Int64(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Int32(2).compare(&Value::Float64(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Decimal("1.10".parse().unwrap()).compare(&Value::Int8(1)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_null_yields_none() {
        assert_eq!(Value::Null.compare(&Value::Int32(1)), None);
        assert_eq!(Value::Int32(1).compare(&Value::Null), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_compare_string_kinds_cross() {
        assert_eq!(
            Value::Varchar("abc".into()).compare(&Value::Text("abd".into())),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_compare_incompatible() {
        assert_eq!(Value::Bool(true).compare(&Value::Int32(1)), None);
        assert_eq!(Value::Text("1".into()).compare(&Value::Int32(1)), None);
    }

    #[test]
    fn test_coerce_integer_narrowing() {
        assert_eq!(
            Value::Int64(42).coerce_to(ValueKind::Int16).unwrap(),
            Value::Int16(42)
        );
        assert!(Value::Int64(1 << 40).coerce_to(ValueKind::Int16).is_err());
    }

    #[test]
    fn test_coerce_null_to_anything() {
        assert_eq!(Value::Null.coerce_to(ValueKind::Text).unwrap(), Value::Null);
    }

    #[test]
    fn test_coerce_string_kinds() {
        assert_eq!(
            Value::Text("x".into()).coerce_to(ValueKind::Varchar).unwrap(),
            Value::Varchar("x".into())
        );
    }

    #[test]
    fn test_to_bool() {
        assert_eq!(Value::Bool(true).to_bool(), Some(true));
        assert_eq!(Value::Null.to_bool(), None);
        assert_eq!(Value::Int32(1).to_bool(), None);
    }

    #[test]
    fn test_kind_codes_stable() {
        // These codes are written to disk; a change here is a format break.
        assert_eq!(ValueKind::Null.code(), 0);
        assert_eq!(ValueKind::Int64.code(), 5);
        assert_eq!(ValueKind::Text.code(), 11);
        assert_eq!(ValueKind::Blob.code(), 16);
        for code in 0..=16 {
            assert_eq!(ValueKind::from_code(code).unwrap().code(), code);
        }
        assert!(ValueKind::from_code(17).is_none());
    }
}
