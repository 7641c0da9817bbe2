use crate::common::{BITMAP_PAGE_HEADER_SIZE, BITMAP_SIZE, PAGE_SIZE};

use super::{read_u32, write_u32};

/// Bitmap page layout:
///
/// +-----------------------+
/// | page_allocated (u32)  |  number of set bits
/// | next_free_page (u32)  |  scan hint, u32::MAX when the extent is full
/// +-----------------------+
/// | bitmap bytes          |  bit k of byte k/8: 0 = free, 1 = allocated
/// +-----------------------+
///
/// A zeroed page is a valid, empty bitmap.
const PAGE_ALLOCATED_OFFSET: usize = 0;
const NEXT_FREE_PAGE_OFFSET: usize = 4;
const BITMAP_OFFSET: usize = BITMAP_PAGE_HEADER_SIZE;

const NO_FREE_PAGE: u32 = u32::MAX;

pub struct BitmapPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> BitmapPage<T> {
    pub fn new(data: T) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE);
        Self { data }
    }

    /// Maximum number of pages tracked by one bitmap page.
    pub const fn max_supported_size() -> u32 {
        BITMAP_SIZE
    }

    pub fn page_allocated(&self) -> u32 {
        read_u32(self.data.as_ref(), PAGE_ALLOCATED_OFFSET)
    }

    /// Offset that the next allocation will hand out, if any.
    pub fn next_free_page(&self) -> Option<u32> {
        match read_u32(self.data.as_ref(), NEXT_FREE_PAGE_OFFSET) {
            NO_FREE_PAGE => None,
            offset => Some(offset),
        }
    }

    pub fn is_full(&self) -> bool {
        self.page_allocated() >= BITMAP_SIZE
    }

    pub fn is_page_free(&self, page_offset: u32) -> bool {
        if page_offset >= BITMAP_SIZE {
            return false;
        }
        let (byte, bit) = Self::locate(page_offset);
        self.data.as_ref()[BITMAP_OFFSET + byte] & (1 << bit) == 0
    }

    fn locate(page_offset: u32) -> (usize, u8) {
        ((page_offset / 8) as usize, (page_offset % 8) as u8)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> BitmapPage<T> {
    /// Marks the next free page as allocated and returns its offset within the extent.
    pub fn allocate_page(&mut self) -> Option<u32> {
        let offset = self.next_free_page()?;
        if self.is_full() || !self.is_page_free(offset) {
            return None;
        }

        self.set_bit(offset, true);
        let allocated = self.page_allocated() + 1;
        self.set_page_allocated(allocated);

        if allocated == BITMAP_SIZE {
            self.set_next_free_page(NO_FREE_PAGE);
        } else {
            let next = (1..BITMAP_SIZE)
                .map(|step| (offset + step) % BITMAP_SIZE)
                .find(|&candidate| self.is_page_free(candidate))
                .unwrap_or(NO_FREE_PAGE);
            self.set_next_free_page(next);
        }

        Some(offset)
    }

    /// Clears the bit for `page_offset`. Returns false if the page was already free.
    pub fn deallocate_page(&mut self, page_offset: u32) -> bool {
        if page_offset >= BITMAP_SIZE || self.is_page_free(page_offset) {
            return false;
        }

        self.set_bit(page_offset, false);
        self.set_page_allocated(self.page_allocated() - 1);
        if self.next_free_page().is_none() {
            self.set_next_free_page(page_offset);
        }
        true
    }

    fn set_bit(&mut self, page_offset: u32, allocated: bool) {
        let (byte, bit) = Self::locate(page_offset);
        let slot = &mut self.data.as_mut()[BITMAP_OFFSET + byte];
        if allocated {
            *slot |= 1 << bit;
        } else {
            *slot &= !(1 << bit);
        }
    }

    fn set_page_allocated(&mut self, count: u32) {
        write_u32(self.data.as_mut(), PAGE_ALLOCATED_OFFSET, count);
    }

    fn set_next_free_page(&mut self, offset: u32) {
        write_u32(self.data.as_mut(), NEXT_FREE_PAGE_OFFSET, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_allocates_in_order() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = BitmapPage::new(&mut buf[..]);

        for expected in 0..16 {
            assert_eq!(page.allocate_page(), Some(expected));
        }
        assert_eq!(page.page_allocated(), 16);
        assert!(!page.is_page_free(3));
        assert!(page.is_page_free(16));
    }

    #[test]
    fn test_bitmap_reuses_freed_slot_when_full() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = BitmapPage::new(&mut buf[..]);

        for _ in 0..BITMAP_SIZE {
            assert!(page.allocate_page().is_some());
        }
        assert!(page.is_full());
        assert_eq!(page.next_free_page(), None);
        assert_eq!(page.allocate_page(), None);

        assert!(page.deallocate_page(1234));
        assert_eq!(page.next_free_page(), Some(1234));
        assert_eq!(page.allocate_page(), Some(1234));
        assert_eq!(page.allocate_page(), None);
    }

    #[test]
    fn test_bitmap_double_free_rejected() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = BitmapPage::new(&mut buf[..]);

        let offset = page.allocate_page().unwrap();
        assert!(page.deallocate_page(offset));
        assert!(!page.deallocate_page(offset));
        assert_eq!(page.page_allocated(), 0);
    }

    #[test]
    fn test_bitmap_hint_wraps_around() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = BitmapPage::new(&mut buf[..]);

        for _ in 0..4 {
            page.allocate_page();
        }
        page.deallocate_page(0);
        // Hint still points past the tail; the freed head is found after wrapping.
        assert_eq!(page.allocate_page(), Some(4));
        for _ in 5..BITMAP_SIZE {
            page.allocate_page();
        }
        assert_eq!(page.next_free_page(), Some(0));
        assert_eq!(page.allocate_page(), Some(0));
    }

    #[test]
    fn test_bitmap_view_over_shared_slice() {
        let mut buf = [0u8; PAGE_SIZE];
        BitmapPage::new(&mut buf[..]).allocate_page();

        let view = BitmapPage::new(&buf[..]);
        assert_eq!(view.page_allocated(), 1);
        assert!(!view.is_page_free(0));
    }
}
