use bytes::{Buf, BufMut};

use crate::common::{Result, StrataError};

use super::{ensure_remaining, DataType};

pub const COLUMN_MAGIC_NUM: u32 = 210928;

/// A named, typed column and its position in the owning table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    table_index: u32,
    nullable: bool,
    unique: bool,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        table_index: u32,
        nullable: bool,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            table_index,
            nullable,
            unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn table_index(&self) -> u32 {
        self.table_index
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn serialized_size(&self) -> usize {
        4 + 4 + self.name.len() + 4 + 4 + 4 + 1 + 1
    }

    /// Layout: magic, name length, name, type tag, length, table index, nullable, unique.
    pub fn serialize_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(COLUMN_MAGIC_NUM);
        buf.put_u32_le(self.name.len() as u32);
        buf.put_slice(self.name.as_bytes());
        buf.put_u32_le(self.data_type.type_tag());
        buf.put_u32_le(self.data_type.length());
        buf.put_u32_le(self.table_index);
        buf.put_u8(self.nullable as u8);
        buf.put_u8(self.unique as u8);
    }

    pub fn deserialize_from(buf: &mut impl Buf) -> Result<Self> {
        ensure_remaining(buf, 8, "column header")?;
        let magic = buf.get_u32_le();
        if magic != COLUMN_MAGIC_NUM {
            return Err(StrataError::Corrupted(format!(
                "bad column magic {}",
                magic
            )));
        }
        let name_len = buf.get_u32_le() as usize;
        ensure_remaining(buf, name_len + 14, "column body")?;
        let mut name = vec![0u8; name_len];
        buf.copy_to_slice(&mut name);
        let name = String::from_utf8(name)
            .map_err(|e| StrataError::Corrupted(format!("column name: {}", e)))?;
        let tag = buf.get_u32_le();
        let length = buf.get_u32_le();
        let data_type = DataType::from_tag(tag, length)?;
        let table_index = buf.get_u32_le();
        let nullable = buf.get_u8() != 0;
        let unique = buf.get_u8() != 0;

        Ok(Self {
            name,
            data_type,
            table_index,
            nullable,
            unique,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_serialization() {
        let column = Column::new("name", DataType::Char(32), 2, true, false);
        let mut buf = Vec::new();
        column.serialize_to(&mut buf);
        assert_eq!(buf.len(), column.serialized_size());
        assert_eq!(&buf[..4], &COLUMN_MAGIC_NUM.to_le_bytes());

        let decoded = Column::deserialize_from(&mut &buf[..]).unwrap();
        assert_eq!(decoded, column);
        assert_eq!(decoded.data_type(), DataType::Char(32));
    }

    #[test]
    fn test_column_bad_magic() {
        let mut buf = Vec::new();
        Column::new("id", DataType::Int, 0, false, true).serialize_to(&mut buf);
        buf[0] ^= 0xFF;
        assert!(matches!(
            Column::deserialize_from(&mut &buf[..]),
            Err(StrataError::Corrupted(_))
        ));
    }
}
