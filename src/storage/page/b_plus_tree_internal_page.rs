use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use crate::common::{PageId, Result, StrataError, PAGE_SIZE};

use super::{
    read_page_id, write_page_id, BPlusTreePage, IndexPageType, B_PLUS_TREE_PAGE_HEADER_SIZE,
};

pub const INTERNAL_PAGE_HEADER_SIZE: usize = B_PLUS_TREE_PAGE_HEADER_SIZE;

/// Internal page: the shared header followed by packed `(key, child page id)` pairs.
///
/// With `n = size()` pairs, the key in slot 0 is never compared. Child `i` covers keys in
/// `[key_at(i), key_at(i + 1))`.
pub struct BPlusTreeInternalPage<T> {
    page: BPlusTreePage<T>,
}

impl<T> Deref for BPlusTreeInternalPage<T> {
    type Target = BPlusTreePage<T>;

    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

impl<T> DerefMut for BPlusTreeInternalPage<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.page
    }
}

impl<T: AsRef<[u8]>> BPlusTreeInternalPage<T> {
    pub fn new(data: T) -> Self {
        Self::from_header(BPlusTreePage::new(data))
    }

    pub(crate) fn from_header(page: BPlusTreePage<T>) -> Self {
        Self { page }
    }

    /// Number of pairs that fit in a page for the given key size.
    pub fn capacity(key_size: usize) -> usize {
        (PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / (key_size + 4)
    }

    fn pair_size(&self) -> usize {
        self.key_size() + 4
    }

    fn pair_offset(&self, index: usize) -> usize {
        INTERNAL_PAGE_HEADER_SIZE + index * self.pair_size()
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        let offset = self.pair_offset(index);
        &self.data()[offset..offset + self.key_size()]
    }

    pub fn value_at(&self, index: usize) -> PageId {
        read_page_id(self.data(), self.pair_offset(index) + self.key_size())
    }

    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    /// Child page whose key range contains `key`.
    pub fn lookup<F>(&self, key: &[u8], compare: F) -> PageId
    where
        F: Fn(&[u8], &[u8]) -> Ordering,
    {
        // Largest slot in 1..size whose key is <= `key`, or slot 0.
        let (mut left, mut right) = (1, self.size());
        while left < right {
            let mid = left + (right - left) / 2;
            match compare(self.key_at(mid), key) {
                Ordering::Greater => right = mid,
                _ => left = mid + 1,
            }
        }
        self.value_at(left - 1)
    }

    fn pairs(&self, from: usize, to: usize) -> &[u8] {
        &self.data()[self.pair_offset(from)..self.pair_offset(to)]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> BPlusTreeInternalPage<T> {
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, key_size: usize, max_size: usize) {
        self.init_header(IndexPageType::Internal, page_id, parent_id, key_size, max_size);
    }

    pub fn set_key_at(&mut self, index: usize, key: &[u8]) {
        let offset = self.pair_offset(index);
        let key_size = self.key_size();
        self.data_mut()[offset..offset + key_size].copy_from_slice(&key[..key_size]);
    }

    pub fn set_value_at(&mut self, index: usize, value: PageId) {
        let offset = self.pair_offset(index) + self.key_size();
        write_page_id(self.data_mut(), offset, value);
    }

    /// Turns an empty page into a root with two children separated by `key`.
    pub fn populate_new_root(&mut self, old_value: PageId, key: &[u8], new_value: PageId) {
        self.set_value_at(0, old_value);
        self.set_key_at(1, key);
        self.set_value_at(1, new_value);
        self.set_size(2);
    }

    /// Inserts `(key, new_value)` right after the slot holding `old_value`.
    pub fn insert_node_after(
        &mut self,
        old_value: PageId,
        key: &[u8],
        new_value: PageId,
    ) -> Result<usize> {
        let index = self.value_index(old_value).ok_or_else(|| {
            StrataError::IndexCorrupted(format!(
                "child {} missing from internal page {}",
                old_value,
                self.page_id()
            ))
        })?;
        let size = self.size();
        self.shift_right(index + 1, size);
        self.set_key_at(index + 1, key);
        self.set_value_at(index + 1, new_value);
        self.set_size(size + 1);
        Ok(size + 1)
    }

    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        let (from, to) = (self.pair_offset(index + 1), self.pair_offset(size));
        let dest = self.pair_offset(index);
        self.data_mut().copy_within(from..to, dest);
        self.set_size(size - 1);
    }

    /// Empties a single-child page and returns that child.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        debug_assert_eq!(self.size(), 1);
        let child = self.value_at(0);
        self.set_size(0);
        child
    }

    /// Moves the upper `size / 2` pairs into an empty `recipient`.
    /// Returns the moved children, whose parent pointers the caller must update.
    pub fn move_half_to<U>(&mut self, recipient: &mut BPlusTreeInternalPage<U>) -> Vec<PageId>
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let start = size - size / 2;
        recipient.append_pairs(self.pairs(start, size), size - start);
        self.set_size(start);
        recipient.children(0, recipient.size())
    }

    /// Appends every pair to `recipient`, with `middle_key` (the parent's separator) taking
    /// the place of the dummy slot-0 key. Returns the moved children.
    pub fn move_all_to<U>(
        &mut self,
        recipient: &mut BPlusTreeInternalPage<U>,
        middle_key: &[u8],
    ) -> Vec<PageId>
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.set_key_at(0, middle_key);
        let size = self.size();
        let start = recipient.size();
        recipient.append_pairs(self.pairs(0, size), size);
        self.set_size(0);
        recipient.children(start, start + size)
    }

    /// Moves the first child to the end of `recipient` (its left sibling), keyed by
    /// `middle_key`. Afterwards `key_at(0)` holds the new separator for the parent.
    pub fn move_first_to_end_of<U>(
        &mut self,
        recipient: &mut BPlusTreeInternalPage<U>,
        middle_key: &[u8],
    ) -> PageId
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        let child = self.value_at(0);
        let end = recipient.size();
        recipient.set_key_at(end, middle_key);
        recipient.set_value_at(end, child);
        recipient.set_size(end + 1);
        self.remove(0);
        child
    }

    /// Moves the last child to the front of `recipient` (its right sibling). `middle_key`
    /// becomes the real key of the recipient's old first child; the moved key lands in
    /// slot 0 and is the new separator for the parent.
    pub fn move_last_to_front_of<U>(
        &mut self,
        recipient: &mut BPlusTreeInternalPage<U>,
        middle_key: &[u8],
    ) -> PageId
    where
        U: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let child = self.value_at(last);
        let key = self.key_at(last).to_vec();

        let size = recipient.size();
        recipient.shift_right(0, size);
        recipient.set_key_at(1, middle_key);
        recipient.set_key_at(0, &key);
        recipient.set_value_at(0, child);
        recipient.set_size(size + 1);

        self.set_size(last);
        child
    }

    fn append_pairs(&mut self, pairs: &[u8], count: usize) {
        let size = self.size();
        let offset = self.pair_offset(size);
        self.data_mut()[offset..offset + pairs.len()].copy_from_slice(pairs);
        self.set_size(size + count);
    }

    fn children(&self, from: usize, to: usize) -> Vec<PageId> {
        (from..to).map(|i| self.value_at(i)).collect()
    }

    /// Opens a hole at `index` by moving pairs `index..size` one slot to the right.
    fn shift_right(&mut self, index: usize, size: usize) {
        let (from, to) = (self.pair_offset(index), self.pair_offset(size));
        let dest = self.pair_offset(index + 1);
        self.data_mut().copy_within(from..to, dest);
    }
}
