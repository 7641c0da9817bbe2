//! Byte-level views over raw page buffers.
//!
//! Every view borrows a page-sized buffer (`&[u8]` for reads, `&mut [u8]` for writes) and
//! exposes typed accessors at fixed little-endian offsets. Nothing here owns page memory or
//! talks to the buffer pool.

mod b_plus_tree_internal_page;
mod b_plus_tree_leaf_page;
mod b_plus_tree_page;
mod bitmap_page;
mod disk_meta_page;
mod index_roots_page;

pub use b_plus_tree_internal_page::*;
pub use b_plus_tree_leaf_page::*;
pub use b_plus_tree_page::*;
pub use bitmap_page::*;
pub use disk_meta_page::*;
pub use index_roots_page::*;

use crate::common::PageId;

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_page_id(data: &[u8], offset: usize) -> PageId {
    PageId::new(read_u32(data, offset))
}

#[inline]
pub(crate) fn write_page_id(data: &mut [u8], offset: usize, page_id: PageId) {
    write_u32(data, offset, page_id.as_u32());
}
