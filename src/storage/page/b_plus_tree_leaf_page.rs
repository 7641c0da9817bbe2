use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use crate::common::{PageId, RowId, INVALID_PAGE_ID, PAGE_SIZE};

use super::{
    read_page_id, read_u32, write_page_id, write_u32, BPlusTreePage, IndexPageType,
    B_PLUS_TREE_PAGE_HEADER_SIZE,
};

const NEXT_PAGE_ID_OFFSET: usize = B_PLUS_TREE_PAGE_HEADER_SIZE;

pub const LEAF_PAGE_HEADER_SIZE: usize = B_PLUS_TREE_PAGE_HEADER_SIZE + 4;

/// Leaf page: the shared header, the next leaf's page id, then packed `(key, row id)` pairs
/// sorted by key.
pub struct BPlusTreeLeafPage<T> {
    page: BPlusTreePage<T>,
}

impl<T> Deref for BPlusTreeLeafPage<T> {
    type Target = BPlusTreePage<T>;

    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

impl<T> DerefMut for BPlusTreeLeafPage<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.page
    }
}

impl<T: AsRef<[u8]>> BPlusTreeLeafPage<T> {
    pub fn new(data: T) -> Self {
        Self::from_header(BPlusTreePage::new(data))
    }

    pub(crate) fn from_header(page: BPlusTreePage<T>) -> Self {
        Self { page }
    }

    /// Number of pairs that fit in a page for the given key size.
    pub fn capacity(key_size: usize) -> usize {
        (PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / (key_size + RowId::SIZE)
    }

    pub fn next_page_id(&self) -> PageId {
        read_page_id(self.data(), NEXT_PAGE_ID_OFFSET)
    }

    fn pair_size(&self) -> usize {
        self.key_size() + RowId::SIZE
    }

    pub(crate) fn pair_offset(&self, index: usize) -> usize {
        LEAF_PAGE_HEADER_SIZE + index * self.pair_size()
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        let offset = self.pair_offset(index);
        &self.data()[offset..offset + self.key_size()]
    }

    pub fn value_at(&self, index: usize) -> RowId {
        let offset = self.pair_offset(index) + self.key_size();
        RowId::new(
            read_page_id(self.data(), offset),
            read_u32(self.data(), offset + 4),
        )
    }

    /// First slot whose key is >= `key` (may equal `size()`).
    pub fn key_index<F>(&self, key: &[u8], compare: F) -> usize
    where
        F: Fn(&[u8], &[u8]) -> Ordering,
    {
        let (mut left, mut right) = (0, self.size());
        while left < right {
            let mid = left + (right - left) / 2;
            if compare(self.key_at(mid), key) == Ordering::Less {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        left
    }

    pub fn lookup<F>(&self, key: &[u8], compare: F) -> Option<RowId>
    where
        F: Fn(&[u8], &[u8]) -> Ordering,
    {
        let index = self.key_index(key, &compare);
        (index < self.size() && compare(self.key_at(index), key) == Ordering::Equal)
            .then(|| self.value_at(index))
    }

    fn pairs(&self, from: usize, to: usize) -> &[u8] {
        &self.data()[self.pair_offset(from)..self.pair_offset(to)]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> BPlusTreeLeafPage<T> {
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, key_size: usize, max_size: usize) {
        self.init_header(IndexPageType::Leaf, page_id, parent_id, key_size, max_size);
        self.set_next_page_id(INVALID_PAGE_ID);
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        write_page_id(self.data_mut(), NEXT_PAGE_ID_OFFSET, next_page_id);
    }

    fn set_pair_at(&mut self, index: usize, key: &[u8], value: RowId) {
        let offset = self.pair_offset(index);
        let key_size = self.key_size();
        let data = self.data_mut();
        data[offset..offset + key_size].copy_from_slice(&key[..key_size]);
        write_page_id(data, offset + key_size, value.page_id);
        write_u32(data, offset + key_size + 4, value.slot_num);
    }

    /// Inserts in sorted position and returns the new size. The caller rules out duplicates.
    pub fn insert<F>(&mut self, key: &[u8], value: RowId, compare: F) -> usize
    where
        F: Fn(&[u8], &[u8]) -> Ordering,
    {
        let size = self.size();
        let index = self.key_index(key, compare);
        self.shift_right(index, size);
        self.set_pair_at(index, key, value);
        self.set_size(size + 1);
        size + 1
    }

    /// Removes `key` if present and returns the resulting size.
    pub fn remove_and_delete_record<F>(&mut self, key: &[u8], compare: F) -> usize
    where
        F: Fn(&[u8], &[u8]) -> Ordering,
    {
        let size = self.size();
        let index = self.key_index(key, &compare);
        if index < size && compare(self.key_at(index), key) == Ordering::Equal {
            self.remove_at(index);
            size - 1
        } else {
            size
        }
    }

    /// Moves the upper `size / 2` pairs into an empty `recipient`.
    pub fn move_half_to<U>(&mut self, recipient: &mut BPlusTreeLeafPage<U>)
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let start = size - size / 2;
        recipient.append_pairs(self.pairs(start, size), size - start);
        self.set_size(start);
    }

    /// Appends every pair to `recipient` (the left sibling) and hands over the leaf chain.
    pub fn move_all_to<U>(&mut self, recipient: &mut BPlusTreeLeafPage<U>)
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        recipient.append_pairs(self.pairs(0, size), size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    pub fn move_first_to_end_of<U>(&mut self, recipient: &mut BPlusTreeLeafPage<U>)
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        recipient.append_pairs(self.pairs(0, 1), 1);
        self.remove_at(0);
    }

    pub fn move_last_to_front_of<U>(&mut self, recipient: &mut BPlusTreeLeafPage<U>)
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let size = recipient.size();
        recipient.shift_right(0, size);
        let dest = recipient.pair_offset(0);
        let pair = self.pairs(last, last + 1);
        recipient.data_mut()[dest..dest + pair.len()].copy_from_slice(pair);
        recipient.set_size(size + 1);
        self.set_size(last);
    }

    fn remove_at(&mut self, index: usize) {
        let size = self.size();
        let (from, to) = (self.pair_offset(index + 1), self.pair_offset(size));
        let dest = self.pair_offset(index);
        self.data_mut().copy_within(from..to, dest);
        self.set_size(size - 1);
    }

    fn append_pairs(&mut self, pairs: &[u8], count: usize) {
        let size = self.size();
        let offset = self.pair_offset(size);
        self.data_mut()[offset..offset + pairs.len()].copy_from_slice(pairs);
        self.set_size(size + count);
    }

    fn shift_right(&mut self, index: usize, size: usize) {
        let (from, to) = (self.pair_offset(index), self.pair_offset(size));
        let dest = self.pair_offset(index + 1);
        self.data_mut().copy_within(from..to, dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: i32) -> [u8; 4] {
        k.to_le_bytes()
    }

    fn cmp(a: &[u8], b: &[u8]) -> Ordering {
        let a = i32::from_le_bytes(a.try_into().unwrap());
        let b = i32::from_le_bytes(b.try_into().unwrap());
        a.cmp(&b)
    }

    fn rid(k: i32) -> RowId {
        RowId::new(PageId::new(k as u32), k as u32)
    }

    fn leaf<'a>(buf: &'a mut [u8], page_id: u32, keys: &[i32]) -> BPlusTreeLeafPage<&'a mut [u8]> {
        let mut page = BPlusTreeLeafPage::new(buf);
        page.init(PageId::new(page_id), INVALID_PAGE_ID, 4, 8);
        for &k in keys {
            page.insert(&key(k), rid(k), cmp);
        }
        page
    }

    fn keys_of<T: AsRef<[u8]>>(page: &BPlusTreeLeafPage<T>) -> Vec<i32> {
        (0..page.size())
            .map(|i| i32::from_le_bytes(page.key_at(i).try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut buf = [0u8; PAGE_SIZE];
        let page = leaf(&mut buf, 1, &[5, 1, 4, 2, 3]);
        assert_eq!(keys_of(&page), vec![1, 2, 3, 4, 5]);
        assert_eq!(page.lookup(&key(4), cmp), Some(rid(4)));
        assert_eq!(page.lookup(&key(9), cmp), None);
        assert_eq!(page.key_index(&key(0), cmp), 0);
        assert_eq!(page.key_index(&key(6), cmp), 5);
        assert!(!page.next_page_id().is_valid());
    }

    #[test]
    fn test_remove_reports_size() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut page = leaf(&mut buf, 1, &[1, 2, 3]);
        assert_eq!(page.remove_and_delete_record(&key(7), cmp), 3);
        assert_eq!(page.remove_and_delete_record(&key(2), cmp), 2);
        assert_eq!(keys_of(&page), vec![1, 3]);
    }

    #[test]
    fn test_split_and_merge() {
        let mut left_buf = [0u8; PAGE_SIZE];
        let mut right_buf = [0u8; PAGE_SIZE];
        let mut left = leaf(&mut left_buf, 1, &[1, 2, 3, 4, 5]);
        left.set_next_page_id(PageId::new(77));
        let mut right = leaf(&mut right_buf, 2, &[]);

        left.move_half_to(&mut right);
        assert_eq!(keys_of(&left), vec![1, 2, 3]);
        assert_eq!(keys_of(&right), vec![4, 5]);
        assert_eq!(right.value_at(0), rid(4));

        right.set_next_page_id(PageId::new(77));
        right.move_all_to(&mut left);
        assert_eq!(keys_of(&left), vec![1, 2, 3, 4, 5]);
        assert_eq!(left.next_page_id(), PageId::new(77));
        assert_eq!(right.size(), 0);
    }

    #[test]
    fn test_borrow_from_siblings() {
        let mut left_buf = [0u8; PAGE_SIZE];
        let mut right_buf = [0u8; PAGE_SIZE];
        let mut left = leaf(&mut left_buf, 1, &[1, 2, 3]);
        let mut right = leaf(&mut right_buf, 2, &[7]);

        left.move_last_to_front_of(&mut right);
        assert_eq!(keys_of(&left), vec![1, 2]);
        assert_eq!(keys_of(&right), vec![3, 7]);
        assert_eq!(right.value_at(0), rid(3));

        right.move_first_to_end_of(&mut left);
        assert_eq!(keys_of(&left), vec![1, 2, 3]);
        assert_eq!(keys_of(&right), vec![7]);
    }
}
