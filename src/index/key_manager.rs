use std::cmp::Ordering;

use crate::common::{Result, StrataError};
use crate::record::{Row, Schema};

use super::KeyComparator;

/// Encodes key rows of a fixed schema into fixed-size index keys and orders them field by
/// field.
///
/// A key is the row serialization zero-padded to `key_size` bytes.
#[derive(Debug, Clone)]
pub struct KeyManager {
    key_schema: Schema,
    key_size: usize,
}

impl KeyManager {
    pub fn new(key_schema: Schema, key_size: usize) -> Self {
        Self {
            key_schema,
            key_size,
        }
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    pub fn serialize_from_key(&self, key: &Row) -> Result<Vec<u8>> {
        let size = key.serialized_size();
        if size > self.key_size {
            return Err(StrataError::KeyTooLarge {
                size,
                max: self.key_size,
            });
        }
        let mut buf = Vec::with_capacity(self.key_size);
        key.serialize_to(&mut buf);
        buf.resize(self.key_size, 0);
        Ok(buf)
    }

    pub fn deserialize_to_key(&self, data: &[u8]) -> Result<Row> {
        Row::deserialize_from(&mut &data[..], &self.key_schema)
    }

    fn compare_rows(a: &Row, b: &Row) -> Ordering {
        a.fields()
            .iter()
            .zip(b.fields())
            .map(|(x, y)| x.compare(y).unwrap_or(Ordering::Equal))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.field_count().cmp(&b.field_count()))
    }
}

impl KeyComparator for KeyManager {
    fn key_size(&self) -> usize {
        self.key_size
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match (self.deserialize_to_key(a), self.deserialize_to_key(b)) {
            (Ok(a), Ok(b)) => Self::compare_rows(&a, &b),
            // Undecodable keys still need a total order.
            _ => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Column, DataType, Field};

    fn manager() -> KeyManager {
        let schema = Schema::new(
            vec![
                Column::new("dept", DataType::Char(8), 0, false, false),
                Column::new("id", DataType::Int, 1, false, false),
            ],
            false,
        );
        KeyManager::new(schema, 32)
    }

    fn key(dept: &str, id: i32) -> Row {
        Row::new(vec![Field::Char(dept.to_string()), Field::Int(id)])
    }

    #[test]
    fn test_key_encoding() {
        let km = manager();
        let bytes = km.serialize_from_key(&key("eng", 4)).unwrap();
        assert_eq!(bytes.len(), 32);
        let decoded = km.deserialize_to_key(&bytes).unwrap();
        assert_eq!(decoded.fields(), key("eng", 4).fields());
    }

    #[test]
    fn test_key_ordering_is_field_by_field() {
        let km = manager();
        let a = km.serialize_from_key(&key("eng", 10)).unwrap();
        let b = km.serialize_from_key(&key("eng", 9)).unwrap();
        let c = km.serialize_from_key(&key("ops", 1)).unwrap();
        assert_eq!(km.compare(&a, &b), Ordering::Greater);
        assert_eq!(km.compare(&b, &c), Ordering::Less);
        assert_eq!(km.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_key_too_large() {
        let km = KeyManager::new(manager().key_schema().clone(), 8);
        assert!(matches!(
            km.serialize_from_key(&key("engineering", 1)),
            Err(StrataError::KeyTooLarge { max: 8, .. })
        ));
    }
}
