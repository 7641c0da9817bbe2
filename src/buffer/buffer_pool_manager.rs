use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, StrataError};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruReplacer, PageGuard, ReadPageGuard, WritePageGuard};

/// Bookkeeping protected by the pool latch
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Free list: frames that hold no page
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager caches disk pages in a fixed set of frames.
///
/// A page is resident in at most one frame. Every fetch or new page returns a [`PageGuard`]
/// that pins the page; a pinned page is never chosen for eviction. Unpinned frames are
/// evicted in LRU order, dirty ones written back first.
///
/// Pin counts, dirty flags, the page table and the free list only change under the pool
/// latch. Page latches are taken outside it, with one exception: writing back a victim,
/// whose pin count of zero means no guard can hold its latch.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The buffer pool frames
    frames: Vec<FrameHeader>,
    /// Pool latch
    state: Mutex<PoolState>,
    /// LRU replacer for eviction decisions
    replacer: LruReplacer,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with `pool_size` frames over the given disk manager.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let frames = (0..pool_size)
            .map(|i| FrameHeader::new(FrameId::new(i as u32)))
            .collect();
        let free_list = (0..pool_size).map(|i| FrameId::new(i as u32)).collect();

        Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Pins `page_id`, reading it from disk if it is not resident.
    ///
    /// Fails with [`StrataError::BufferPoolFull`] when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageGuard<'_>> {
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }

        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = self.frame(frame_id);
            debug_assert_eq!(frame.page_id(), page_id);
            frame.pin();
            self.replacer.pin(frame_id);
            return Ok(PageGuard::new(self, frame, page_id));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let bytes = match self.disk_scheduler.schedule_read_sync(page_id) {
            Ok(bytes) => bytes,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        let frame = self.frame(frame_id);
        frame.load(page_id, &bytes);
        state.page_table.insert(page_id, frame_id);
        Ok(PageGuard::new(self, frame, page_id))
    }

    /// Fetches a page and takes its latch in shared mode.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard<'_>> {
        Ok(self.fetch_page(page_id)?.read())
    }

    /// Fetches a page and takes its latch in exclusive mode.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard<'_>> {
        Ok(self.fetch_page(page_id)?.write())
    }

    /// Allocates a new zeroed page and pins it. The page id is taken from the disk manager
    /// only once a frame is secured, so a full pool leaks no ids.
    pub fn new_page(&self) -> Result<PageGuard<'_>> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = match self.disk_scheduler.disk_manager().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        let frame = self.frame(frame_id);
        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();
        // Zeroes must reach disk even if nobody writes the page: the id may be recycled.
        frame.set_dirty(true);
        state.page_table.insert(page_id, frame_id);

        Ok(PageGuard::new(self, frame, page_id))
    }

    /// Drops one pin on `page_id`. Returns false if the page is not resident or not pinned.
    /// A dirty unpin sticks until the page is flushed.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = self.frame(frame_id);
        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.unpin(frame_id);
                }
                true
            }
        }
    }

    /// Writes a resident page to disk whether or not it is dirty, and clears its dirty flag.
    /// Returns false if the page is not resident. The caller must not hold a write guard on
    /// the page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }

        // Pin so the frame stays put while the latch is taken outside the pool latch.
        let guard = {
            let state = self.state.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };
            let frame = self.frame(frame_id);
            frame.pin();
            self.replacer.pin(frame_id);
            PageGuard::new(self, frame, page_id)
        };

        let frame = guard.frame();
        let latch = frame.read_latch();
        self.disk_scheduler
            .schedule_write_sync(page_id, Bytes::copy_from_slice(&latch[..]))?;
        frame.set_dirty(false);
        drop(latch);
        drop(guard);
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Evicts `page_id` from the pool and frees it on disk.
    ///
    /// Returns true if the page is not resident, false if it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = self.frame(frame_id);
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
        if frame.is_dirty() {
            let bytes = Bytes::copy_from_slice(&frame.read_latch()[..]);
            self.disk_scheduler.schedule_write_sync(page_id, bytes)?;
        }

        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        debug!("deleted {} from {}", page_id, frame_id);
        Ok(true)
    }

    /// Allocates a page id on disk without bringing it into the pool.
    pub fn allocate_page(&self) -> Result<PageId> {
        self.disk_scheduler.disk_manager().allocate_page()
    }

    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        self.disk_scheduler.disk_manager().deallocate_page(page_id)
    }

    pub fn is_page_free(&self, page_id: PageId) -> Result<bool> {
        self.disk_scheduler.disk_manager().is_page_free(page_id)
    }

    /// True iff no frame is pinned. Logs every pinned page otherwise.
    pub fn check_all_unpinned(&self) -> bool {
        let _state = self.state.lock();
        let mut all_unpinned = true;
        for frame in self.frames.iter().filter(|frame| frame.pin_count() > 0) {
            error!(
                "{} in {} still has pin count {}",
                frame.page_id(),
                frame.frame_id(),
                frame.pin_count()
            );
            all_unpinned = false;
        }
        all_unpinned
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frame(frame_id).pin_count())
    }

    /// Whether the page currently occupies a frame.
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    fn frame(&self, frame_id: FrameId) -> &FrameHeader {
        &self.frames[frame_id.as_usize()]
    }

    /// Finds a frame for a new resident page: the free list first, then an LRU victim.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(StrataError::BufferPoolFull)?;
        let frame = self.frame(frame_id);
        assert_eq!(frame.pin_count(), 0, "victim {} is pinned", frame_id);
        let victim_page_id = frame.page_id();

        if frame.is_dirty() {
            let bytes = Bytes::copy_from_slice(&frame.read_latch()[..]);
            if let Err(e) = self.disk_scheduler.schedule_write_sync(victim_page_id, bytes) {
                self.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        state.page_table.remove(&victim_page_id);
        frame.reset();
        debug!("evicted {} from {}", victim_page_id, frame_id);
        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all_pages() {
            warn!("failed to flush buffer pool on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PAGE_SIZE;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
        assert!(bpm.check_all_unpinned());
    }

    #[test]
    fn test_new_page_is_pinned_until_guard_drops() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);
        assert!(!bpm.check_all_unpinned());

        drop(guard);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
        assert!(bpm.check_all_unpinned());
    }

    #[test]
    fn test_read_write_guards() {
        let (bpm, _temp) = create_bpm(10);
        let page_id = bpm.new_page().unwrap().page_id();

        {
            let mut guard = bpm.fetch_page_write(page_id).unwrap();
            guard.data_mut()[0] = 42;
            guard[100] = 255;
        }

        let first = bpm.fetch_page_read(page_id).unwrap();
        let second = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(bpm.get_pin_count(page_id), Some(2));
        assert_eq!(first.data()[0], 42);
        assert_eq!(second[100], 255);
    }

    #[test]
    fn test_unpin_rejects_double_unpin() {
        let (bpm, _temp) = create_bpm(10);
        let page_id = bpm.new_page().unwrap().page_id();

        assert!(!bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(PageId::new(99), false));
    }

    #[test]
    fn test_dirty_flag_sticks_until_flush() {
        let (bpm, _temp) = create_bpm(10);
        let page_id = bpm.new_page().unwrap().page_id();
        bpm.flush_page(page_id).unwrap();

        let mut guard = bpm.fetch_page(page_id).unwrap();
        guard.mark_dirty();
        drop(guard);
        drop(bpm.fetch_page(page_id).unwrap());

        let frame_id = bpm.state.lock().page_table[&page_id];
        assert!(bpm.frame(frame_id).is_dirty());
        assert!(bpm.flush_page(page_id).unwrap());
        assert!(!bpm.frame(frame_id).is_dirty());
    }

    #[test]
    fn test_flush_persists_across_instances() {
        let (bpm, temp) = create_bpm(10);
        let page_id = {
            let mut guard = bpm.new_page().unwrap().write();
            guard.data_mut()[0] = 42;
            guard.page_id()
        };
        assert!(bpm.flush_page(page_id).unwrap());
        drop(bpm);

        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, dm);
        let guard = bpm2.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(guard.data().len(), PAGE_SIZE);
    }

    #[test]
    fn test_pool_full_fails_fast_without_leaking_ids() {
        let (bpm, _temp) = create_bpm(2);

        let _guard1 = bpm.new_page().unwrap();
        let _guard2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(StrataError::BufferPoolFull)));
        assert!(matches!(
            bpm.fetch_page(PageId::new(7)),
            Err(StrataError::BufferPoolFull)
        ));
        assert_eq!(bpm.disk_manager().num_allocated_pages(), 2);
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);
        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();

        assert!(!bpm.delete_page(page_id).unwrap());
        drop(guard);

        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);
        assert!(bpm.is_page_free(page_id).unwrap());
        // Not resident any more: deleting again is a no-op success.
        assert!(bpm.delete_page(page_id).unwrap());
    }

    #[test]
    fn test_invalid_page_id_rejected() {
        let (bpm, _temp) = create_bpm(2);
        assert!(matches!(
            bpm.fetch_page(crate::common::INVALID_PAGE_ID),
            Err(StrataError::InvalidPageId(_))
        ));
    }
}
