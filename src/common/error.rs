use thiserror::Error;

use super::types::PageId;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Disk is full, all {0} extents are in use")]
    OutOfDiskSpace(u32),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Index roots page is full")]
    IndexRootsFull,

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Key of {size} bytes does not fit in {max} bytes")]
    KeyTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, StrataError>;
