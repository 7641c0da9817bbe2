use crate::common::{PageId, PAGE_SIZE};

use super::{read_page_id, read_u32, write_page_id, write_u32};

/// Index roots page layout:
///
/// +---------------------------+
/// | count (u32)               |
/// +---------------------------+
/// | index_id (u32)            |  entry 0
/// | root_page_id (u32)        |
/// | ...                       |
/// +---------------------------+
///
/// Entries are kept dense; deleting swaps the last entry into the hole.
const COUNT_OFFSET: usize = 0;
const ENTRIES_OFFSET: usize = 4;
const ENTRY_SIZE: usize = 8;

/// Maximum number of indexes one roots page can track
pub const MAX_INDEX_ROOTS: usize = (PAGE_SIZE - ENTRIES_OFFSET) / ENTRY_SIZE;

pub struct IndexRootsPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> IndexRootsPage<T> {
    pub fn new(data: T) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE);
        Self { data }
    }

    pub fn count(&self) -> usize {
        read_u32(self.data.as_ref(), COUNT_OFFSET) as usize
    }

    pub fn get_root_id(&self, index_id: u32) -> Option<PageId> {
        self.find(index_id)
            .map(|slot| read_page_id(self.data.as_ref(), Self::entry_offset(slot) + 4))
    }

    fn find(&self, index_id: u32) -> Option<usize> {
        (0..self.count()).find(|&slot| read_u32(self.data.as_ref(), Self::entry_offset(slot)) == index_id)
    }

    fn entry_offset(slot: usize) -> usize {
        ENTRIES_OFFSET + slot * ENTRY_SIZE
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> IndexRootsPage<T> {
    pub fn init(&mut self) {
        self.data.as_mut().fill(0);
    }

    /// Records a new index. Returns false if it is already present or the page is full.
    pub fn insert(&mut self, index_id: u32, root_id: PageId) -> bool {
        let count = self.count();
        if count >= MAX_INDEX_ROOTS || self.find(index_id).is_some() {
            return false;
        }
        let offset = Self::entry_offset(count);
        let data = self.data.as_mut();
        write_u32(data, offset, index_id);
        write_page_id(data, offset + 4, root_id);
        write_u32(data, COUNT_OFFSET, count as u32 + 1);
        true
    }

    /// Changes the root of a known index. Returns false if the index is not recorded.
    pub fn update(&mut self, index_id: u32, root_id: PageId) -> bool {
        match self.find(index_id) {
            Some(slot) => {
                write_page_id(self.data.as_mut(), Self::entry_offset(slot) + 4, root_id);
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, index_id: u32) -> bool {
        let Some(slot) = self.find(index_id) else {
            return false;
        };
        let last = self.count() - 1;
        let data = self.data.as_mut();
        if slot != last {
            let (from, to) = (Self::entry_offset(last), Self::entry_offset(slot));
            data.copy_within(from..from + ENTRY_SIZE, to);
        }
        write_u32(data, COUNT_OFFSET, last as u32);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roots_insert_update_delete() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = IndexRootsPage::new(&mut buf[..]);
        page.init();

        assert!(page.insert(1, PageId::new(10)));
        assert!(page.insert(2, PageId::new(20)));
        assert!(page.insert(3, PageId::new(30)));
        assert!(!page.insert(2, PageId::new(99)));
        assert_eq!(page.count(), 3);

        assert!(page.update(2, PageId::new(21)));
        assert!(!page.update(7, PageId::new(70)));
        assert_eq!(page.get_root_id(2), Some(PageId::new(21)));

        assert!(page.delete(1));
        assert!(!page.delete(1));
        assert_eq!(page.count(), 2);
        assert_eq!(page.get_root_id(1), None);
        assert_eq!(page.get_root_id(3), Some(PageId::new(30)));
    }

    #[test]
    fn test_index_roots_full() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = IndexRootsPage::new(&mut buf[..]);
        for id in 0..MAX_INDEX_ROOTS as u32 {
            assert!(page.insert(id, PageId::new(id)));
        }
        assert!(!page.insert(u32::MAX - 1, PageId::new(0)));
    }
}
