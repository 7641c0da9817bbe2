//! Strata - the storage core of a disk-oriented database
//!
//! Pages live in a single file managed in extents, are cached by a buffer pool, and are
//! indexed by a disk-resident B+Tree.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and page layouts
//!   - `DiskManager`: logical page allocation over bitmap-managed extents, page I/O
//!   - `DiskScheduler`: background worker thread that performs page I/O
//!   - `BitmapPage`, `DiskMetaPage`, `IndexRootsPage`, B+Tree page views
//!
//! - **Buffer Pool** (`buffer`): caches pages in a fixed number of frames
//!   - `BufferPoolManager`: fetch/new/unpin/flush/delete over the page table
//!   - `LruReplacer`: picks the least recently unpinned frame for eviction
//!   - `PageGuard`, `ReadPageGuard`, `WritePageGuard`: scoped pins and page latches
//!
//! - **Records** (`record`): data types, fields, columns, schemas and rows with their
//!   serialized forms
//!
//! - **Catalog** (`catalog`): catalog metadata page and database bootstrap
//!
//! - **Index** (`index`): `BPlusTree`, its `IndexIterator`, and key comparators
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::catalog;
//! use strata::common::{PageId, RowId};
//! use strata::index::{BPlusTree, IntegerComparator};
//! use strata::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
//! catalog::bootstrap(&bpm).unwrap();
//!
//! let mut tree = BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 0, 0).unwrap();
//! let key = IntegerComparator::encode(42);
//! tree.insert(&key, RowId::new(PageId::new(7), 3)).unwrap();
//! assert_eq!(tree.get_value(&key).unwrap(), Some(RowId::new(PageId::new(7), 3)));
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod index;
pub mod record;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, Result, RowId, StrataError};
