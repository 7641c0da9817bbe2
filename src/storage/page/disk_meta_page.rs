use crate::common::{DISK_META_HEADER_SIZE, MAX_EXTENTS, PAGE_SIZE};

use super::{read_u32, write_u32};

/// Physical page 0 of a database file.
///
/// +------------------------------+
/// | num_extents (u32)            |
/// | num_allocated_pages (u32)    |
/// +------------------------------+
/// | extent_used_page[0..] (u32)  |  one counter per extent
/// +------------------------------+
const NUM_EXTENTS_OFFSET: usize = 0;
const NUM_ALLOCATED_PAGES_OFFSET: usize = 4;
const EXTENT_USED_PAGE_OFFSET: usize = DISK_META_HEADER_SIZE;

pub struct DiskMetaPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> DiskMetaPage<T> {
    pub fn new(data: T) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE);
        Self { data }
    }

    pub fn num_extents(&self) -> u32 {
        read_u32(self.data.as_ref(), NUM_EXTENTS_OFFSET)
    }

    pub fn num_allocated_pages(&self) -> u32 {
        read_u32(self.data.as_ref(), NUM_ALLOCATED_PAGES_OFFSET)
    }

    pub fn extent_used_page(&self, extent: u32) -> u32 {
        assert!(extent < MAX_EXTENTS, "extent {} out of range", extent);
        read_u32(self.data.as_ref(), Self::extent_offset(extent))
    }

    fn extent_offset(extent: u32) -> usize {
        EXTENT_USED_PAGE_OFFSET + extent as usize * 4
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> DiskMetaPage<T> {
    pub fn set_num_extents(&mut self, count: u32) {
        assert!(count <= MAX_EXTENTS);
        write_u32(self.data.as_mut(), NUM_EXTENTS_OFFSET, count);
    }

    pub fn set_num_allocated_pages(&mut self, count: u32) {
        write_u32(self.data.as_mut(), NUM_ALLOCATED_PAGES_OFFSET, count);
    }

    pub fn set_extent_used_page(&mut self, extent: u32, count: u32) {
        assert!(extent < MAX_EXTENTS, "extent {} out of range", extent);
        write_u32(self.data.as_mut(), Self::extent_offset(extent), count);
    }
}
