use bytes::{Buf, BufMut};

use crate::common::{Result, StrataError};

use super::{ensure_remaining, Column};

pub const SCHEMA_MAGIC_NUM: u32 = 200715;

/// An ordered list of columns.
///
/// `is_managed` marks schemas owned by the catalog rather than built ad hoc for a key or a
/// projection. It is persisted but has no effect on layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    is_managed: bool,
}

impl Schema {
    pub fn new(columns: Vec<Column>, is_managed: bool) -> Self {
        Self {
            columns,
            is_managed,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn is_managed(&self) -> bool {
        self.is_managed
    }

    pub fn serialized_size(&self) -> usize {
        8 + self
            .columns
            .iter()
            .map(Column::serialized_size)
            .sum::<usize>()
            + 1
    }

    /// Layout: magic, column count, each column, managed flag.
    pub fn serialize_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(SCHEMA_MAGIC_NUM);
        buf.put_u32_le(self.columns.len() as u32);
        for column in &self.columns {
            column.serialize_to(buf);
        }
        buf.put_u8(self.is_managed as u8);
    }

    pub fn deserialize_from(buf: &mut impl Buf) -> Result<Self> {
        ensure_remaining(buf, 8, "schema header")?;
        let magic = buf.get_u32_le();
        if magic != SCHEMA_MAGIC_NUM {
            return Err(StrataError::Corrupted(format!(
                "bad schema magic {}",
                magic
            )));
        }
        let count = buf.get_u32_le() as usize;
        let columns = (0..count)
            .map(|_| Column::deserialize_from(buf))
            .collect::<Result<Vec<_>>>()?;
        ensure_remaining(buf, 1, "schema managed flag")?;
        let is_managed = buf.get_u8() != 0;

        Ok(Self {
            columns,
            is_managed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataType;

    fn sample_schema() -> Schema {
        Schema::new(
            vec![
                Column::new("id", DataType::Int, 0, false, true),
                Column::new("name", DataType::Char(64), 1, true, false),
                Column::new("score", DataType::Float, 2, true, false),
            ],
            true,
        )
    }

    #[test]
    fn test_schema_serialization() {
        let schema = sample_schema();
        let mut buf = Vec::new();
        schema.serialize_to(&mut buf);
        assert_eq!(buf.len(), schema.serialized_size());

        let decoded = Schema::deserialize_from(&mut &buf[..]).unwrap();
        assert_eq!(decoded, schema);
        assert!(decoded.is_managed());
    }

    #[test]
    fn test_column_index() {
        let schema = sample_schema();
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
        assert_eq!(schema.column(2).unwrap().name(), "score");
    }

    #[test]
    fn test_truncated_schema() {
        let mut buf = Vec::new();
        sample_schema().serialize_to(&mut buf);
        buf.truncate(buf.len() - 1);
        assert!(matches!(
            Schema::deserialize_from(&mut &buf[..]),
            Err(StrataError::Corrupted(_))
        ));
    }
}
