//! Catalog metadata persisted at a fixed logical page, and database bootstrap.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use log::{debug, info};

use crate::buffer::BufferPoolManager;
use crate::common::{
    PageId, Result, StrataError, CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID, PAGE_SIZE,
};
use crate::record::ensure_remaining;
use crate::storage::page::IndexRootsPage;

pub const CATALOG_METADATA_MAGIC_NUM: u32 = 89849;

/// Where each table's and each index's metadata page lives.
///
/// Layout: magic, table count, index count, then `(table_id, page_id)` pairs followed by
/// `(index_id, page_id)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogMeta {
    pub table_meta_pages: BTreeMap<u32, PageId>,
    pub index_meta_pages: BTreeMap<u32, PageId>,
}

impl CatalogMeta {
    pub fn serialized_size(&self) -> usize {
        12 + 8 * (self.table_meta_pages.len() + self.index_meta_pages.len())
    }

    pub fn serialize_to(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(CATALOG_METADATA_MAGIC_NUM);
        buf.put_u32_le(self.table_meta_pages.len() as u32);
        buf.put_u32_le(self.index_meta_pages.len() as u32);
        for map in [&self.table_meta_pages, &self.index_meta_pages] {
            for (&id, page_id) in map {
                buf.put_u32_le(id);
                buf.put_u32_le(page_id.as_u32());
            }
        }
    }

    pub fn deserialize_from(buf: &mut impl Buf) -> Result<Self> {
        ensure_remaining(buf, 12, "catalog header")?;
        let magic = buf.get_u32_le();
        if magic != CATALOG_METADATA_MAGIC_NUM {
            return Err(StrataError::Corrupted(format!(
                "bad catalog magic {}",
                magic
            )));
        }
        let tables = buf.get_u32_le() as usize;
        let indexes = buf.get_u32_le() as usize;
        ensure_remaining(buf, 8 * (tables + indexes), "catalog entries")?;

        let mut read_map = |count: usize| {
            (0..count)
                .map(|_| (buf.get_u32_le(), PageId::new(buf.get_u32_le())))
                .collect::<BTreeMap<_, _>>()
        };
        let table_meta_pages = read_map(tables);
        let index_meta_pages = read_map(indexes);

        Ok(Self {
            table_meta_pages,
            index_meta_pages,
        })
    }

    pub fn load(bpm: &BufferPoolManager) -> Result<Self> {
        let guard = bpm.fetch_page_read(CATALOG_META_PAGE_ID)?;
        Self::deserialize_from(&mut guard.data())
    }

    pub fn store(&self, bpm: &BufferPoolManager) -> Result<()> {
        let size = self.serialized_size();
        if size > PAGE_SIZE {
            return Err(StrataError::InvalidArgument(format!(
                "catalog metadata of {} bytes exceeds a page",
                size
            )));
        }
        let mut guard = bpm.fetch_page_write(CATALOG_META_PAGE_ID)?;
        let mut data = guard.data_mut();
        data.fill(0);
        self.serialize_to(&mut data);
        Ok(())
    }
}

/// Prepares the fixed pages of a database file and returns its catalog metadata.
///
/// A fresh file gets the catalog meta page and the index roots page as its first two
/// logical pages. An existing file has its catalog meta page validated and loaded.
pub fn bootstrap(bpm: &BufferPoolManager) -> Result<CatalogMeta> {
    if bpm.disk_manager().num_allocated_pages() > 0 {
        let meta = CatalogMeta::load(bpm)?;
        debug!(
            "loaded catalog with {} tables and {} indexes",
            meta.table_meta_pages.len(),
            meta.index_meta_pages.len()
        );
        return Ok(meta);
    }

    for expected in [CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID] {
        let mut guard = bpm.new_page()?.write();
        if guard.page_id() != expected {
            return Err(StrataError::Corrupted(format!(
                "fresh file handed out {} instead of {}",
                guard.page_id(),
                expected
            )));
        }
        if expected == INDEX_ROOTS_PAGE_ID {
            IndexRootsPage::new(guard.data_mut()).init();
        }
    }

    let meta = CatalogMeta::default();
    meta.store(bpm)?;
    info!("initialized new database at {}", bpm.disk_manager().get_db_path());
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_catalog_meta_serialization() {
        let mut meta = CatalogMeta::default();
        meta.table_meta_pages.insert(1, PageId::new(10));
        meta.table_meta_pages.insert(2, PageId::new(11));
        meta.index_meta_pages.insert(7, PageId::new(12));

        let mut buf = Vec::new();
        meta.serialize_to(&mut buf);
        assert_eq!(buf.len(), meta.serialized_size());
        assert_eq!(&buf[..4], &CATALOG_METADATA_MAGIC_NUM.to_le_bytes());
        assert_eq!(CatalogMeta::deserialize_from(&mut &buf[..]).unwrap(), meta);
    }

    #[test]
    fn test_bootstrap_fresh_and_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
            let bpm = BufferPoolManager::new(8, dm);
            let meta = bootstrap(&bpm).unwrap();
            assert_eq!(meta, CatalogMeta::default());
            assert_eq!(bpm.disk_manager().num_allocated_pages(), 2);

            let mut meta = meta;
            meta.index_meta_pages.insert(3, PageId::new(40));
            meta.store(&bpm).unwrap();
        }

        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(8, dm);
        let meta = bootstrap(&bpm).unwrap();
        assert_eq!(meta.index_meta_pages.get(&3), Some(&PageId::new(40)));
        assert_eq!(bpm.disk_manager().num_allocated_pages(), 2);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(8, dm);
        let guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), CATALOG_META_PAGE_ID);
        drop(guard);
        assert!(matches!(
            CatalogMeta::load(&bpm),
            Err(StrataError::Corrupted(_))
        ));
    }
}
