use crate::common::{PageId, Result, StrataError, PAGE_SIZE};

use super::{
    read_page_id, read_u32, write_page_id, write_u32, BPlusTreeInternalPage, BPlusTreeLeafPage,
};

/// Header shared by internal and leaf pages:
///
/// +----------------------+
/// | page_id (u32)        |
/// | parent_page_id (u32) |
/// | page_type (u32)      |
/// | key_size (u32)       |
/// | max_size (u32)       |
/// | size (u32)           |
/// +----------------------+
const PAGE_ID_OFFSET: usize = 0;
const PARENT_PAGE_ID_OFFSET: usize = 4;
const PAGE_TYPE_OFFSET: usize = 8;
const KEY_SIZE_OFFSET: usize = 12;
const MAX_SIZE_OFFSET: usize = 16;
const SIZE_OFFSET: usize = 20;

pub const B_PLUS_TREE_PAGE_HEADER_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IndexPageType {
    Invalid = 0,
    Leaf = 1,
    Internal = 2,
}

impl IndexPageType {
    fn from_u32(tag: u32) -> Self {
        match tag {
            1 => IndexPageType::Leaf,
            2 => IndexPageType::Internal,
            _ => IndexPageType::Invalid,
        }
    }
}

/// View over the common header of a B+Tree page.
pub struct BPlusTreePage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> BPlusTreePage<T> {
    pub fn new(data: T) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE);
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn page_id(&self) -> PageId {
        read_page_id(self.data(), PAGE_ID_OFFSET)
    }

    pub fn parent_page_id(&self) -> PageId {
        read_page_id(self.data(), PARENT_PAGE_ID_OFFSET)
    }

    pub fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }

    pub fn page_type(&self) -> IndexPageType {
        IndexPageType::from_u32(read_u32(self.data(), PAGE_TYPE_OFFSET))
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type() == IndexPageType::Leaf
    }

    pub fn key_size(&self) -> usize {
        read_u32(self.data(), KEY_SIZE_OFFSET) as usize
    }

    pub fn max_size(&self) -> usize {
        read_u32(self.data(), MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    pub fn size(&self) -> usize {
        read_u32(self.data(), SIZE_OFFSET) as usize
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> BPlusTreePage<T> {
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    pub(crate) fn init_header(
        &mut self,
        page_type: IndexPageType,
        page_id: PageId,
        parent_id: PageId,
        key_size: usize,
        max_size: usize,
    ) {
        write_page_id(self.data_mut(), PAGE_ID_OFFSET, page_id);
        write_page_id(self.data_mut(), PARENT_PAGE_ID_OFFSET, parent_id);
        write_u32(self.data_mut(), PAGE_TYPE_OFFSET, page_type as u32);
        write_u32(self.data_mut(), KEY_SIZE_OFFSET, key_size as u32);
        write_u32(self.data_mut(), MAX_SIZE_OFFSET, max_size as u32);
        self.set_size(0);
    }

    pub fn set_parent_page_id(&mut self, parent_id: PageId) {
        write_page_id(self.data_mut(), PARENT_PAGE_ID_OFFSET, parent_id);
    }

    pub fn set_size(&mut self, size: usize) {
        write_u32(self.data_mut(), SIZE_OFFSET, size as u32);
    }

    pub fn increase_size(&mut self, amount: isize) {
        let size = self.size() as isize + amount;
        debug_assert!(size >= 0);
        self.set_size(size as usize);
    }
}

/// A B+Tree page dispatched on its type tag.
pub enum TreePage<T> {
    Leaf(BPlusTreeLeafPage<T>),
    Internal(BPlusTreeInternalPage<T>),
}

impl<T: AsRef<[u8]>> TreePage<T> {
    pub fn new(data: T) -> Result<Self> {
        let header = BPlusTreePage::new(data);
        match header.page_type() {
            IndexPageType::Leaf => Ok(TreePage::Leaf(BPlusTreeLeafPage::from_header(header))),
            IndexPageType::Internal => Ok(TreePage::Internal(
                BPlusTreeInternalPage::from_header(header),
            )),
            IndexPageType::Invalid => Err(StrataError::IndexCorrupted(format!(
                "page {} is not a B+Tree page",
                header.page_id()
            ))),
        }
    }

    pub fn header(&self) -> &BPlusTreePage<T> {
        match self {
            TreePage::Leaf(leaf) => &**leaf,
            TreePage::Internal(internal) => &**internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::INVALID_PAGE_ID;

    #[test]
    fn test_header_round_trip() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = BPlusTreePage::new(&mut buf[..]);
        page.init_header(IndexPageType::Internal, PageId::new(9), INVALID_PAGE_ID, 8, 30);
        page.set_size(4);
        page.increase_size(-1);

        assert_eq!(page.page_id(), PageId::new(9));
        assert!(page.is_root());
        assert!(!page.is_leaf());
        assert_eq!(page.key_size(), 8);
        assert_eq!(page.max_size(), 30);
        assert_eq!(page.min_size(), 15);
        assert_eq!(page.size(), 3);
    }

    #[test]
    fn test_zeroed_page_is_not_a_tree_page() {
        let buf = [0u8; PAGE_SIZE];
        assert!(matches!(
            TreePage::new(&buf[..]),
            Err(StrataError::IndexCorrupted(_))
        ));
    }
}
