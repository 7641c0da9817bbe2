use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// One buffer frame: which page it holds, how many callers pin it, whether it diverges
/// from disk, and the page bytes behind the page latch.
///
/// Page id, pin count and dirty flag only change while the pool latch is held; the atomics
/// let guards read them without taking it.
pub struct FrameHeader {
    frame_id: FrameId,
    page_id: AtomicU32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// The page held by this frame, `INVALID_PAGE_ID` when empty.
    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value, or None if it was already 0.
    pub(crate) fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Takes the page latch in shared mode.
    pub(crate) fn read_latch(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Takes the page latch in exclusive mode.
    pub(crate) fn write_latch(&self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Installs `page_id` with the given bytes, pinned once and clean.
    pub(crate) fn load(&self, page_id: PageId, bytes: &[u8]) {
        self.data.write().copy_from_slice(bytes);
        self.set_page_id(page_id);
        self.pin_count.store(1, Ordering::Release);
        self.set_dirty(false);
    }

    /// Empties the frame and zeroes its bytes.
    pub(crate) fn reset(&self) {
        self.data.write().fill(0);
        self.set_page_id(INVALID_PAGE_ID);
        self.pin_count.store(0, Ordering::Release);
        self.set_dirty(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_new() {
        let frame = FrameHeader::new(FrameId::new(3));
        assert_eq!(frame.frame_id(), FrameId::new(3));
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_header_pin_unpin() {
        let frame = FrameHeader::new(FrameId::new(0));
        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), Some(1));
        assert_eq!(frame.unpin(), Some(0));
        assert_eq!(frame.unpin(), None);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_frame_header_load_and_reset() {
        let frame = FrameHeader::new(FrameId::new(0));
        let mut bytes = [0u8; PAGE_SIZE];
        bytes[10] = 0xAB;

        frame.load(PageId::new(8), &bytes);
        frame.set_dirty(true);
        assert_eq!(frame.page_id(), PageId::new(8));
        assert_eq!(frame.pin_count(), 1);
        assert_eq!(frame.read_latch()[10], 0xAB);

        frame.reset();
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert_eq!(frame.read_latch()[10], 0);
    }
}
