use std::fmt;

use crate::common::{Result, StrataError};

/// Column types understood by rows and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer, 4 bytes.
    Int,
    /// 32-bit IEEE 754 float, 4 bytes.
    Float,
    /// Character data of at most `n` bytes, stored with a u32 length prefix.
    Char(u32),
}

impl DataType {
    const TAG_INT: u32 = 1;
    const TAG_FLOAT: u32 = 2;
    const TAG_CHAR: u32 = 3;

    /// The tag written to disk. 0 is reserved as invalid.
    pub fn type_tag(&self) -> u32 {
        match self {
            DataType::Int => Self::TAG_INT,
            DataType::Float => Self::TAG_FLOAT,
            DataType::Char(_) => Self::TAG_CHAR,
        }
    }

    /// Declared length: 4 for numbers, the maximum byte length for `Char`.
    pub fn length(&self) -> u32 {
        match self {
            DataType::Int | DataType::Float => 4,
            DataType::Char(n) => *n,
        }
    }

    /// Rebuilds a type from its tag and declared length.
    pub fn from_tag(tag: u32, length: u32) -> Result<Self> {
        match tag {
            Self::TAG_INT => Ok(DataType::Int),
            Self::TAG_FLOAT => Ok(DataType::Float),
            Self::TAG_CHAR => Ok(DataType::Char(length)),
            other => Err(StrataError::Corrupted(format!("unknown type tag {}", other))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        for ty in [DataType::Int, DataType::Float, DataType::Char(16)] {
            assert_eq!(DataType::from_tag(ty.type_tag(), ty.length()).unwrap(), ty);
        }
        assert!(matches!(
            DataType::from_tag(0, 4),
            Err(StrataError::Corrupted(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Char(8).to_string(), "CHAR(8)");
        assert_eq!(DataType::Int.to_string(), "INT");
    }
}
