use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant, stored on disk as `-1` (all bits set)
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Bytes at the start of a bitmap page used by its header
pub const BITMAP_PAGE_HEADER_SIZE: usize = 8;

/// Number of data pages tracked by one bitmap page (one bit each)
pub const BITMAP_SIZE: u32 = ((PAGE_SIZE - BITMAP_PAGE_HEADER_SIZE) * 8) as u32;

/// Bytes at the start of the disk meta page used by its header
pub const DISK_META_HEADER_SIZE: usize = 8;

/// Maximum number of extents the disk meta page can describe
pub const MAX_EXTENTS: u32 = ((PAGE_SIZE - DISK_META_HEADER_SIZE) / 4) as u32;

/// Physical page holding the disk meta page
pub const META_PAGE_ID: PageId = PageId(0);

/// Logical page holding the catalog meta data
pub const CATALOG_META_PAGE_ID: PageId = PageId(0);

/// Logical page holding the index id -> root page id table
pub const INDEX_ROOTS_PAGE_ID: PageId = PageId(1);

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 1024;
