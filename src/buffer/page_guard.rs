use std::ops::{Deref, DerefMut};

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::{BufferPoolManager, FrameHeader};

/// A pin on a resident page. The page cannot be evicted while the guard lives; dropping it
/// unpins the page, passing along whether it was written.
///
/// A pinned page is not latched. Call [`PageGuard::read`] or [`PageGuard::write`] to access
/// its bytes.
pub struct PageGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a FrameHeader,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a FrameHeader, page_id: PageId) -> Self {
        Self {
            bpm,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub(crate) fn frame(&self) -> &'a FrameHeader {
        self.frame
    }

    /// Unpin as dirty even if no write guard touched the bytes.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Takes the page latch in shared mode.
    pub fn read(self) -> ReadPageGuard<'a> {
        let frame = self.frame;
        ReadPageGuard {
            latch: frame.read_latch(),
            guard: self,
        }
    }

    /// Takes the page latch in exclusive mode.
    pub fn write(self) -> WritePageGuard<'a> {
        let frame = self.frame;
        WritePageGuard {
            latch: frame.write_latch(),
            guard: self,
        }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if !self.bpm.unpin_page(self.page_id, self.is_dirty) {
            warn!("{} was already unpinned when its guard dropped", self.page_id);
        }
    }
}

/// Shared access to a pinned page. Fields drop in order: the latch before the pin.
pub struct ReadPageGuard<'a> {
    latch: RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>,
    guard: PageGuard<'a>,
}

impl ReadPageGuard<'_> {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }
}

impl Deref for ReadPageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// Exclusive access to a pinned page. Mutable access marks the page dirty.
pub struct WritePageGuard<'a> {
    latch: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
    guard: PageGuard<'a>,
}

impl WritePageGuard<'_> {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.is_dirty = true;
        &mut self.latch[..]
    }
}

impl Deref for WritePageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}
