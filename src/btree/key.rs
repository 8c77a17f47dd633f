//! Index keys and their total order.

use std::cmp::Ordering;
use std::fmt;

use crate::value::{SerializationError, Value};

/// A B-tree key.
///
/// The comparator is total: floats compare via `total_cmp`, and keys of
/// different variants order by variant rank. In practice one index only
/// ever holds one variant, derived from its column's kind.
#[derive(Debug, Clone)]
pub enum IndexKey {
    /// Unsigned 32-bit key (object ids).
    U32(u32),
    /// Signed 64-bit key (all SQL integer kinds widen to this).
    Int(i64),
    /// Floating-point key (REAL and DOUBLE PRECISION widen to this).
    Float(f64),
    /// Text key (CHAR/VARCHAR/TEXT).
    Text(String),
}

impl IndexKey {
    /// Derives a key from a column value.
    ///
    /// Returns `None` for NULL (nulls are not indexed) and for kinds the
    /// index cannot order exactly (JSON, BLOB, DECIMAL).
    pub fn from_value(value: &Value) -> Option<IndexKey> {
        match value {
            Value::Bool(b) => Some(IndexKey::Int(*b as i64)),
            Value::Int8(n) => Some(IndexKey::Int(*n as i64)),
            Value::Int16(n) => Some(IndexKey::Int(*n as i64)),
            Value::Int32(n) => Some(IndexKey::Int(*n as i64)),
            Value::Int64(n) => Some(IndexKey::Int(*n)),
            Value::Float32(n) => Some(IndexKey::Float(*n as f64)),
            Value::Float64(n) => Some(IndexKey::Float(*n)),
            Value::Char(s) | Value::Varchar(s) | Value::Text(s) => {
                Some(IndexKey::Text(s.clone()))
            }
            Value::Date(n) => Some(IndexKey::Int(*n as i64)),
            Value::Time(n) | Value::Timestamp(n) => Some(IndexKey::Int(*n)),
            Value::Null | Value::Decimal(_) | Value::Json(_) | Value::Blob(_) => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IndexKey::U32(_) => 0,
            IndexKey::Int(_) => 1,
            IndexKey::Float(_) => 2,
            IndexKey::Text(_) => 3,
        }
    }

    /// Returns the encoded size in bytes.
    pub fn encoded_size(&self) -> usize {
        1 + match self {
            IndexKey::U32(_) => 4,
            IndexKey::Int(_) | IndexKey::Float(_) => 8,
            IndexKey::Text(s) => 4 + s.len(),
        }
    }

    /// Appends the encoding of this key to `out`: tag byte, then the body,
    /// with text length-prefixed.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            IndexKey::U32(n) => {
                out.push(0);
                out.extend_from_slice(&n.to_le_bytes());
            }
            IndexKey::Int(n) => {
                out.push(1);
                out.extend_from_slice(&n.to_le_bytes());
            }
            IndexKey::Float(n) => {
                out.push(2);
                out.extend_from_slice(&n.to_le_bytes());
            }
            IndexKey::Text(s) => {
                out.push(3);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Decodes one key from the front of `buf`, returning it and the bytes
    /// consumed.
    pub fn decode(buf: &[u8]) -> Result<(IndexKey, usize), SerializationError> {
        let too_small = |required: usize| SerializationError::BufferTooSmall {
            required,
            available: buf.len(),
        };
        let tag = *buf.first().ok_or_else(|| too_small(1))?;
        match tag {
            0 => {
                let body = buf.get(1..5).ok_or_else(|| too_small(5))?;
                Ok((IndexKey::U32(u32::from_le_bytes(body.try_into().unwrap())), 5))
            }
            1 => {
                let body = buf.get(1..9).ok_or_else(|| too_small(9))?;
                Ok((IndexKey::Int(i64::from_le_bytes(body.try_into().unwrap())), 9))
            }
            2 => {
                let body = buf.get(1..9).ok_or_else(|| too_small(9))?;
                Ok((
                    IndexKey::Float(f64::from_le_bytes(body.try_into().unwrap())),
                    9,
                ))
            }
            3 => {
                let len_bytes = buf.get(1..5).ok_or_else(|| too_small(5))?;
                let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
                let body = buf.get(5..5 + len).ok_or_else(|| too_small(5 + len))?;
                let s = String::from_utf8(body.to_vec())
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Ok((IndexKey::Text(s), 5 + len))
            }
            _ => Err(SerializationError::InvalidFormat(format!(
                "unknown index key tag {tag}"
            ))),
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::U32(a), IndexKey::U32(b)) => a.cmp(b),
            (IndexKey::Int(a), IndexKey::Int(b)) => a.cmp(b),
            (IndexKey::Float(a), IndexKey::Float(b)) => a.total_cmp(b),
            (IndexKey::Text(a), IndexKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::U32(n) => write!(f, "{n}"),
            IndexKey::Int(n) => write!(f, "{n}"),
            IndexKey::Float(n) => write!(f, "{n}"),
            IndexKey::Text(s) => write!(f, "'{s}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let keys = [
            IndexKey::U32(7),
            IndexKey::Int(-42),
            IndexKey::Float(2.5),
            IndexKey::Text("hello".into()),
            IndexKey::Text(String::new()),
        ];
        for key in keys {
            let mut buf = Vec::new();
            key.encode(&mut buf);
            assert_eq!(buf.len(), key.encoded_size());
            let (decoded, consumed) = IndexKey::decode(&buf).unwrap();
            assert_eq!(decoded, key);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_total_order_on_floats() {
        let nan = IndexKey::Float(f64::NAN);
        let one = IndexKey::Float(1.0);
        // total_cmp puts NaN above all numbers; the point is that the
        // comparator never panics and is consistent.
        assert_eq!(nan.cmp(&one), Ordering::Greater);
        assert_eq!(nan.cmp(&nan), Ordering::Equal);
    }

    #[test]
    fn test_from_value() {
        use crate::value::Value;
        assert_eq!(
            IndexKey::from_value(&Value::Int16(3)),
            Some(IndexKey::Int(3))
        );
        assert_eq!(
            IndexKey::from_value(&Value::Text("a".into())),
            Some(IndexKey::Text("a".into()))
        );
        assert_eq!(
            IndexKey::from_value(&Value::Float32(1.5)),
            Some(IndexKey::Float(1.5))
        );
        assert_eq!(IndexKey::from_value(&Value::Null), None);
        assert_eq!(IndexKey::from_value(&Value::Blob(vec![1])), None);
    }

    #[test]
    fn test_decode_truncated() {
        let mut buf = Vec::new();
        IndexKey::Text("hello".into()).encode(&mut buf);
        assert!(IndexKey::decode(&buf[..4]).is_err());
        assert!(IndexKey::decode(&[]).is_err());
        assert!(IndexKey::decode(&[9]).is_err());
    }
}
