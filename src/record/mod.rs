//! Row and schema representation with their on-page serialization.
//!
//! All integers are little-endian. Deserialization validates magic numbers and lengths and
//! reports [`StrataError::Corrupted`](crate::common::StrataError::Corrupted) instead of
//! reading past the buffer.

mod column;
mod data_type;
mod field;
mod row;
mod schema;

pub use column::{Column, COLUMN_MAGIC_NUM};
pub use data_type::DataType;
pub use field::Field;
pub use row::Row;
pub use schema::{Schema, SCHEMA_MAGIC_NUM};

use bytes::Buf;

use crate::common::{Result, StrataError};

/// Fails with `Corrupted` unless `buf` still holds `needed` bytes.
pub(crate) fn ensure_remaining(buf: &impl Buf, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(StrataError::Corrupted(format!(
            "{} needs {} bytes, {} left",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}
