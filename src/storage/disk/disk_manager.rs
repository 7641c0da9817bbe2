use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::common::{
    PageId, Result, StrataError, BITMAP_SIZE, MAX_EXTENTS, META_PAGE_ID, PAGE_SIZE,
};
use crate::storage::page::{BitmapPage, DiskMetaPage};

/// The open database file together with a cached copy of its meta page.
struct DiskFile {
    file: File,
    meta: Box<[u8; PAGE_SIZE]>,
}

/// DiskManager maps logical page ids onto a single database file and tracks which pages
/// are allocated.
///
/// Physical layout: `[meta][bitmap 0][B data pages][bitmap 1][B data pages]...` where `B` is
/// [`BITMAP_SIZE`]. Logical page `l` lives in extent `l / B` at physical page
/// `l / B + l + 2`. Reads past the end of the file return zeroed pages.
pub struct DiskManager {
    /// The database file and meta page; helpers below take the locked state so allocation
    /// can read and write several pages under one acquisition
    disk_file: Mutex<DiskFile>,
    /// Path to the database file
    db_path: String,
    /// Number of physical page reads performed
    num_reads: AtomicU32,
    /// Number of physical page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens the database file at `db_path`, creating it if it doesn't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let mut disk_file = DiskFile {
            file,
            meta: Box::new([0u8; PAGE_SIZE]),
        };
        Self::read_physical(&mut disk_file.file, META_PAGE_ID, &mut disk_file.meta[..])?;

        let dm = Self {
            disk_file: Mutex::new(disk_file),
            db_path: path_str,
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        };
        debug!(
            "opened {} with {} extents and {} allocated pages",
            dm.db_path,
            dm.num_extents(),
            dm.num_allocated_pages()
        );
        Ok(dm)
    }

    /// Translates a logical page id into the physical page that stores it.
    pub fn map_page_id(logical_page_id: PageId) -> PageId {
        let logical = logical_page_id.as_u32();
        PageId::new(logical / BITMAP_SIZE + logical + 2)
    }

    /// Physical page holding the bitmap of `extent`.
    fn bitmap_page_id(extent: u32) -> PageId {
        PageId::new(extent * (BITMAP_SIZE + 1) + 1)
    }

    /// Reads a logical page into `data`, which must be exactly PAGE_SIZE bytes.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }
        let mut disk_file = self.disk_file.lock();
        Self::read_physical(&mut disk_file.file, Self::map_page_id(page_id), data)?;
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a logical page from `data`, which must be exactly PAGE_SIZE bytes.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        if !page_id.is_valid() {
            return Err(StrataError::InvalidPageId(page_id));
        }
        let mut disk_file = self.disk_file.lock();
        Self::write_physical(&mut disk_file.file, Self::map_page_id(page_id), data)?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a free logical page, creating a new extent when all existing ones are full.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut guard = self.disk_file.lock();
        let disk_file = &mut *guard;

        let num_extents = DiskMetaPage::new(&disk_file.meta[..]).num_extents();
        let existing = (0..num_extents).find(|&extent| {
            DiskMetaPage::new(&disk_file.meta[..]).extent_used_page(extent) < BITMAP_SIZE
        });
        let extent = match existing {
            Some(extent) => extent,
            None if num_extents >= MAX_EXTENTS => {
                return Err(StrataError::OutOfDiskSpace(MAX_EXTENTS));
            }
            None => {
                debug!("creating extent {}", num_extents);
                DiskMetaPage::new(&mut disk_file.meta[..]).set_num_extents(num_extents + 1);
                num_extents
            }
        };

        let mut bitmap = [0u8; PAGE_SIZE];
        let bitmap_page_id = Self::bitmap_page_id(extent);
        self.read_physical_counted(&mut disk_file.file, bitmap_page_id, &mut bitmap)?;
        let offset = BitmapPage::new(&mut bitmap[..])
            .allocate_page()
            .ok_or_else(|| {
                StrataError::Corrupted(format!(
                    "bitmap of extent {} is full but meta page reports free pages",
                    extent
                ))
            })?;
        self.write_physical_counted(&mut disk_file.file, bitmap_page_id, &bitmap)?;

        {
            let mut meta = DiskMetaPage::new(&mut disk_file.meta[..]);
            meta.set_extent_used_page(extent, meta.extent_used_page(extent) + 1);
            meta.set_num_allocated_pages(meta.num_allocated_pages() + 1);
        }
        self.persist_meta(disk_file)?;

        Ok(PageId::new(extent * BITMAP_SIZE + offset))
    }

    /// Returns a logical page to its extent's bitmap.
    ///
    /// # Panics
    /// Panics if the page is not currently allocated.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut guard = self.disk_file.lock();
        let disk_file = &mut *guard;

        let (extent, offset) = Self::locate(page_id);
        let num_extents = DiskMetaPage::new(&disk_file.meta[..]).num_extents();
        assert!(
            extent < num_extents,
            "deallocating {} beyond the last extent",
            page_id
        );

        let mut bitmap = [0u8; PAGE_SIZE];
        let bitmap_page_id = Self::bitmap_page_id(extent);
        self.read_physical_counted(&mut disk_file.file, bitmap_page_id, &mut bitmap)?;
        assert!(
            BitmapPage::new(&mut bitmap[..]).deallocate_page(offset),
            "deallocating free page {}",
            page_id
        );
        self.write_physical_counted(&mut disk_file.file, bitmap_page_id, &bitmap)?;

        {
            let mut meta = DiskMetaPage::new(&mut disk_file.meta[..]);
            meta.set_extent_used_page(extent, meta.extent_used_page(extent) - 1);
            meta.set_num_allocated_pages(meta.num_allocated_pages() - 1);
        }
        self.persist_meta(disk_file)
    }

    /// Whether a logical page is free. Pages beyond the last extent are free.
    pub fn is_page_free(&self, page_id: PageId) -> Result<bool> {
        let mut guard = self.disk_file.lock();
        let disk_file = &mut *guard;

        let (extent, offset) = Self::locate(page_id);
        if extent >= DiskMetaPage::new(&disk_file.meta[..]).num_extents() {
            return Ok(true);
        }
        let mut bitmap = [0u8; PAGE_SIZE];
        self.read_physical_counted(&mut disk_file.file, Self::bitmap_page_id(extent), &mut bitmap)?;
        Ok(BitmapPage::new(&bitmap[..]).is_page_free(offset))
    }

    fn locate(page_id: PageId) -> (u32, u32) {
        let logical = page_id.as_u32();
        (logical / BITMAP_SIZE, logical % BITMAP_SIZE)
    }

    pub fn num_allocated_pages(&self) -> u32 {
        DiskMetaPage::new(&self.disk_file.lock().meta[..]).num_allocated_pages()
    }

    pub fn num_extents(&self) -> u32 {
        DiskMetaPage::new(&self.disk_file.lock().meta[..]).num_extents()
    }

    pub fn extent_used_pages(&self, extent: u32) -> u32 {
        DiskMetaPage::new(&self.disk_file.lock().meta[..]).extent_used_page(extent)
    }

    /// Returns the number of physical page reads performed.
    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of physical page writes performed.
    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the path to the database file.
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// Writes the meta page and syncs the file.
    pub fn close(&self) -> Result<()> {
        let mut disk_file = self.disk_file.lock();
        self.persist_meta(&mut disk_file)?;
        disk_file.file.sync_all()?;
        Ok(())
    }

    fn persist_meta(&self, disk_file: &mut DiskFile) -> Result<()> {
        let DiskFile { file, meta } = disk_file;
        self.write_physical_counted(file, META_PAGE_ID, &meta[..])
    }

    fn read_physical_counted(&self, file: &mut File, page_id: PageId, data: &mut [u8]) -> Result<()> {
        Self::read_physical(file, page_id, data)?;
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_physical_counted(&self, file: &mut File, page_id: PageId, data: &[u8]) -> Result<()> {
        Self::write_physical(file, page_id, data)?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_physical(file: &mut File, page_id: PageId, data: &mut [u8]) -> Result<()> {
        let offset = page_id.as_u32() as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < data.len() {
            match file.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        // Past the end of the file: the page has never been written.
        data[filled..].fill(0);
        Ok(())
    }

    fn write_physical(file: &mut File, page_id: PageId, data: &[u8]) -> Result<()> {
        let offset = page_id.as_u32() as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let disk_file = self.disk_file.get_mut();
        let result = Self::write_physical(&mut disk_file.file, META_PAGE_ID, &disk_file.meta[..])
            .and_then(|_| disk_file.file.sync_all().map_err(StrataError::from));
        if let Err(e) = result {
            warn!("failed to persist meta page of {}: {}", self.db_path, e);
        }
    }
}
