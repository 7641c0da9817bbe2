use bytes::{Buf, BufMut};

use crate::common::{Result, RowId, StrataError};

use super::{ensure_remaining, Field, Schema};

/// A tuple of fields, optionally tagged with where it is stored.
///
/// Serialized as a field count, then (when non-zero) a null bitmap of `ceil(count / 8)` bytes
/// where a set bit marks a non-null field, then every non-null field in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    row_id: RowId,
    fields: Vec<Field>,
}

impl Row {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            row_id: RowId::default(),
            fields,
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn set_row_id(&mut self, row_id: RowId) {
        self.row_id = row_id;
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn bitmap_len(count: usize) -> usize {
        (count + 7) / 8
    }

    pub fn serialized_size(&self) -> usize {
        if self.fields.is_empty() {
            return 4;
        }
        4 + Self::bitmap_len(self.fields.len())
            + self.fields.iter().map(Field::serialized_size).sum::<usize>()
    }

    pub fn serialize_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.fields.len() as u32);
        if self.fields.is_empty() {
            return;
        }

        let mut bitmap = vec![0u8; Self::bitmap_len(self.fields.len())];
        for (i, field) in self.fields.iter().enumerate() {
            if !field.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        buf.put_slice(&bitmap);

        for field in &self.fields {
            field.serialize_to(buf);
        }
    }

    /// Decodes a row laid out by `schema`. Null fields take their column's type.
    pub fn deserialize_from(buf: &mut impl Buf, schema: &Schema) -> Result<Self> {
        ensure_remaining(buf, 4, "row field count")?;
        let count = buf.get_u32_le() as usize;
        if count == 0 {
            return Ok(Row::default());
        }
        if count != schema.column_count() {
            return Err(StrataError::Corrupted(format!(
                "row has {} fields, schema has {} columns",
                count,
                schema.column_count()
            )));
        }

        let bitmap_len = Self::bitmap_len(count);
        ensure_remaining(buf, bitmap_len, "row null bitmap")?;
        let mut bitmap = vec![0u8; bitmap_len];
        buf.copy_to_slice(&mut bitmap);

        let fields = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                    Field::deserialize_from(buf, column.data_type())
                } else {
                    Ok(Field::Null(column.data_type()))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Row::new(fields))
    }

    /// Projects the columns of `key_schema`, matched by name against `schema`.
    pub fn key_from_row(&self, schema: &Schema, key_schema: &Schema) -> Result<Row> {
        let fields = key_schema
            .columns()
            .iter()
            .map(|key_column| {
                schema
                    .column_index(key_column.name())
                    .and_then(|i| self.fields.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        StrataError::InvalidArgument(format!(
                            "key column {} not in row",
                            key_column.name()
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Column, DataType};

    fn schema() -> Schema {
        Schema::new(
            vec![
                Column::new("id", DataType::Int, 0, false, true),
                Column::new("name", DataType::Char(16), 1, true, false),
                Column::new("score", DataType::Float, 2, true, false),
            ],
            true,
        )
    }

    #[test]
    fn test_row_with_nulls() {
        let row = Row::new(vec![
            Field::Int(7),
            Field::Null(DataType::Char(16)),
            Field::Float(2.5),
        ]);
        let mut buf = Vec::new();
        row.serialize_to(&mut buf);
        assert_eq!(buf.len(), row.serialized_size());
        // count, bitmap 0b101, int, float
        assert_eq!(buf.len(), 4 + 1 + 4 + 4);
        assert_eq!(buf[4], 0b101);

        let decoded = Row::deserialize_from(&mut &buf[..], &schema()).unwrap();
        assert_eq!(decoded.fields(), row.fields());
    }

    #[test]
    fn test_empty_row() {
        let mut buf = Vec::new();
        Row::default().serialize_to(&mut buf);
        assert_eq!(buf, vec![0, 0, 0, 0]);
        let decoded = Row::deserialize_from(&mut &buf[..], &schema()).unwrap();
        assert_eq!(decoded.field_count(), 0);
    }

    #[test]
    fn test_key_from_row() {
        let row = Row::new(vec![
            Field::Int(1),
            Field::Char("alice".into()),
            Field::Float(9.0),
        ]);
        let key_schema = Schema::new(
            vec![
                Column::new("score", DataType::Float, 0, true, false),
                Column::new("id", DataType::Int, 1, false, true),
            ],
            false,
        );
        let key = row.key_from_row(&schema(), &key_schema).unwrap();
        assert_eq!(key.fields(), &[Field::Float(9.0), Field::Int(1)]);

        let bad_key = Schema::new(
            vec![Column::new("age", DataType::Int, 0, false, false)],
            false,
        );
        assert!(matches!(
            row.key_from_row(&schema(), &bad_key),
            Err(StrataError::InvalidArgument(_))
        ));
    }
}
