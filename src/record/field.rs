use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::{Result, StrataError};

use super::{ensure_remaining, DataType};

/// A single typed value inside a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A null of the given column type.
    Null(DataType),
    Int(i32),
    Float(f32),
    Char(String),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null(_))
    }

    /// Bytes written by [`Field::serialize_to`]. Nulls take none; they live in the row's
    /// null bitmap.
    pub fn serialized_size(&self) -> usize {
        match self {
            Field::Null(_) => 0,
            Field::Int(_) | Field::Float(_) => 4,
            Field::Char(s) => 4 + s.len(),
        }
    }

    pub fn serialize_to(&self, buf: &mut impl BufMut) {
        match self {
            Field::Null(_) => {}
            Field::Int(v) => buf.put_i32_le(*v),
            Field::Float(v) => buf.put_f32_le(*v),
            Field::Char(s) => {
                buf.put_u32_le(s.len() as u32);
                buf.put_slice(s.as_bytes());
            }
        }
    }

    /// Reads a non-null value of `data_type`.
    pub fn deserialize_from(buf: &mut impl Buf, data_type: DataType) -> Result<Self> {
        match data_type {
            DataType::Int => {
                ensure_remaining(buf, 4, "int field")?;
                Ok(Field::Int(buf.get_i32_le()))
            }
            DataType::Float => {
                ensure_remaining(buf, 4, "float field")?;
                Ok(Field::Float(buf.get_f32_le()))
            }
            DataType::Char(_) => {
                ensure_remaining(buf, 4, "char length")?;
                let len = buf.get_u32_le() as usize;
                ensure_remaining(buf, len, "char field")?;
                let mut bytes = vec![0u8; len];
                buf.copy_to_slice(&mut bytes);
                String::from_utf8(bytes)
                    .map(Field::Char)
                    .map_err(|e| StrataError::Corrupted(format!("char field: {}", e)))
            }
        }
    }

    /// Orders two fields of the same type. Nulls order before everything else; values of
    /// different types are incomparable.
    pub fn compare(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::Null(_), Field::Null(_)) => Some(Ordering::Equal),
            (Field::Null(_), _) => Some(Ordering::Less),
            (_, Field::Null(_)) => Some(Ordering::Greater),
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::Float(a), Field::Float(b)) => a.partial_cmp(b),
            (Field::Char(a), Field::Char(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null(_) => write!(f, "NULL"),
            Field::Int(v) => write!(f, "{}", v),
            Field::Float(v) => write!(f, "{}", v),
            Field::Char(s) => write!(f, "'{}'", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_field_layout() {
        let mut buf = Vec::new();
        Field::Char("abc".to_string()).serialize_to(&mut buf);
        assert_eq!(buf, vec![3, 0, 0, 0, b'a', b'b', b'c']);

        let field = Field::deserialize_from(&mut &buf[..], DataType::Char(8)).unwrap();
        assert_eq!(field, Field::Char("abc".to_string()));
    }

    #[test]
    fn test_truncated_field_is_corrupted() {
        let buf = [5u8, 0, 0, 0, b'a'];
        let result = Field::deserialize_from(&mut &buf[..], DataType::Char(8));
        assert!(matches!(result, Err(StrataError::Corrupted(_))));
    }

    #[test]
    fn test_compare() {
        assert_eq!(Field::Int(1).compare(&Field::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Field::Null(DataType::Int).compare(&Field::Int(i32::MIN)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Field::Char("b".into()).compare(&Field::Char("ab".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Field::Int(1).compare(&Field::Float(1.0)), None);
    }
}
