use std::cmp::Ordering;
use std::sync::Arc;

use log::{debug, warn};

use crate::buffer::{BufferPoolManager, PageGuard, ReadPageGuard, WritePageGuard};
use crate::common::{
    PageId, Result, RowId, StrataError, INDEX_ROOTS_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::{
    BPlusTreeInternalPage, BPlusTreeLeafPage, BPlusTreePage, IndexRootsPage, TreePage,
};

use super::{IndexIterator, KeyComparator};

/// A disk-resident B+Tree mapping unique fixed-size keys to row ids.
///
/// Every page access goes through the buffer pool. The current root is persisted in the
/// index roots page under `index_id` whenever it changes, so a tree can be reopened with
/// [`BPlusTree::new`].
///
/// A node splits as soon as an insert brings it to its max size, and is rebalanced as soon
/// as a remove takes it below half of it.
pub struct BPlusTree<C: KeyComparator> {
    index_id: u32,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    root_page_id: PageId,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Opens the tree recorded under `index_id`, or an empty one if none is recorded.
    ///
    /// A max size of 0 picks the largest size a page can hold for the comparator's key size.
    pub fn new(
        index_id: u32,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let key_size = comparator.key_size();
        if key_size == 0 {
            return Err(StrataError::InvalidArgument("key size must be non-zero".into()));
        }
        let leaf_capacity = BPlusTreeLeafPage::<&[u8]>::capacity(key_size);
        let internal_capacity = BPlusTreeInternalPage::<&[u8]>::capacity(key_size);
        let leaf_max_size = if leaf_max_size == 0 {
            leaf_capacity
        } else {
            leaf_max_size
        };
        let internal_max_size = if internal_max_size == 0 {
            internal_capacity
        } else {
            internal_max_size
        };

        if !(2..=leaf_capacity).contains(&leaf_max_size) {
            return Err(StrataError::InvalidArgument(format!(
                "leaf max size {} outside 2..={}",
                leaf_max_size, leaf_capacity
            )));
        }
        if !(4..=internal_capacity).contains(&internal_max_size) {
            return Err(StrataError::InvalidArgument(format!(
                "internal max size {} outside 4..={}",
                internal_max_size, internal_capacity
            )));
        }

        let root_page_id = {
            let guard = bpm.fetch_page_read(INDEX_ROOTS_PAGE_ID)?;
            IndexRootsPage::new(guard.data())
                .get_root_id(index_id)
                .unwrap_or(INVALID_PAGE_ID)
        };

        Ok(Self {
            index_id,
            bpm,
            comparator,
            root_page_id,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn index_id(&self) -> u32 {
        self.index_id
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn is_empty(&self) -> bool {
        !self.root_page_id.is_valid()
    }

    pub fn leaf_max_size(&self) -> usize {
        self.leaf_max_size
    }

    pub fn internal_max_size(&self) -> usize {
        self.internal_max_size
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.comparator.compare(a, b)
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.comparator.key_size() {
            return Err(StrataError::InvalidArgument(format!(
                "key is {} bytes, index keys are {}",
                key.len(),
                self.comparator.key_size()
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------------

    /// Point lookup.
    pub fn get_value(&self, key: &[u8]) -> Result<Option<RowId>> {
        self.check_key(key)?;
        if self.is_empty() {
            return Ok(None);
        }
        let guard = self.find_leaf(Some(key))?;
        let leaf = BPlusTreeLeafPage::new(guard.data());
        Ok(leaf.lookup(key, |a, b| self.compare(a, b)))
    }

    /// Descends to the leaf covering `key`, or the leftmost leaf for `None`. Latches are
    /// coupled: a child is latched before its parent is released.
    fn find_leaf(&self, key: Option<&[u8]>) -> Result<ReadPageGuard<'_>> {
        let mut guard = self.bpm.fetch_page_read(self.root_page_id)?;
        loop {
            let child = match TreePage::new(guard.data())? {
                TreePage::Leaf(_) => None,
                TreePage::Internal(internal) => Some(match key {
                    Some(key) => internal.lookup(key, |a, b| self.compare(a, b)),
                    None => internal.value_at(0),
                }),
            };
            match child {
                Some(child) => guard = self.bpm.fetch_page_read(child)?,
                None => return Ok(guard),
            }
        }
    }

    // ---------------------------------------------------------------------
    // Insertion
    // ---------------------------------------------------------------------

    /// Inserts a unique key. Returns false if the key is already present.
    ///
    /// The search path stays pinned and pages for every split the insert will cause are
    /// allocated and pinned up front. If the pool cannot supply them the tree is left
    /// untouched and `BufferPoolFull` is returned.
    pub fn insert(&mut self, key: &[u8], value: RowId) -> Result<bool> {
        self.check_key(key)?;
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }

        let bpm = Arc::clone(&self.bpm);
        let Some((path, needed)) = self.plan_insert(&bpm, key)? else {
            return Ok(false);
        };
        let mut reserved = self.reserve_pages(&bpm, needed)?;
        let result = self.insert_into_leaf(key, value, &mut reserved);
        drop(path);
        if !reserved.is_empty() {
            warn!(
                "index {}: releasing {} unused reserved pages",
                self.index_id,
                reserved.len()
            );
            self.release_pages(reserved);
        }
        result.map(|_| true)
    }

    fn start_new_tree(&mut self, key: &[u8], value: RowId) -> Result<()> {
        let page_id = {
            let mut guard = self.bpm.new_page()?.write();
            let page_id = guard.page_id();
            let mut leaf = BPlusTreeLeafPage::new(guard.data_mut());
            leaf.init(
                page_id,
                INVALID_PAGE_ID,
                self.comparator.key_size(),
                self.leaf_max_size,
            );
            leaf.insert(key, value, |a, b| self.compare(a, b));
            page_id
        };
        self.root_page_id = page_id;
        if let Err(e) = self.update_root_page_id() {
            self.root_page_id = INVALID_PAGE_ID;
            self.free_page(page_id)?;
            return Err(e);
        }
        debug!("index {}: new tree rooted at {}", self.index_id, page_id);
        Ok(())
    }

    /// Pins the search path for `key` and counts the pages a split cascade would allocate:
    /// one per node on the trailing run of full nodes, plus one for a new root when the run
    /// reaches it. Returns `None` if `key` is already present.
    fn plan_insert<'b>(
        &self,
        bpm: &'b BufferPoolManager,
        key: &[u8],
    ) -> Result<Option<(Vec<PageGuard<'b>>, usize)>> {
        let mut path = Vec::new();
        let mut full_run = 0;
        let mut page_id = self.root_page_id;
        loop {
            path.push(bpm.fetch_page(page_id)?);
            let guard = bpm.fetch_page_read(page_id)?;
            let child = match TreePage::new(guard.data())? {
                TreePage::Leaf(leaf) => {
                    if leaf.lookup(key, |a, b| self.compare(a, b)).is_some() {
                        return Ok(None);
                    }
                    full_run = if leaf.size() + 1 >= leaf.max_size() {
                        full_run + 1
                    } else {
                        0
                    };
                    None
                }
                TreePage::Internal(internal) => {
                    full_run = if internal.size() + 1 >= internal.max_size() {
                        full_run + 1
                    } else {
                        0
                    };
                    Some(internal.lookup(key, |a, b| self.compare(a, b)))
                }
            };
            match child {
                Some(child) => page_id = child,
                None => break,
            }
        }
        let needed = if full_run == path.len() {
            full_run + 1
        } else {
            full_run
        };
        Ok(Some((path, needed)))
    }

    fn reserve_pages<'b>(
        &self,
        bpm: &'b BufferPoolManager,
        count: usize,
    ) -> Result<Vec<PageGuard<'b>>> {
        let mut reserved = Vec::with_capacity(count);
        for _ in 0..count {
            match bpm.new_page() {
                Ok(guard) => reserved.push(guard),
                Err(e) => {
                    warn!(
                        "index {}: could not reserve {} pages for a split: {}",
                        self.index_id, count, e
                    );
                    self.release_pages(reserved);
                    return Err(e);
                }
            }
        }
        Ok(reserved)
    }

    fn release_pages(&self, pages: Vec<PageGuard<'_>>) {
        let page_ids: Vec<_> = pages.iter().map(PageGuard::page_id).collect();
        drop(pages);
        for page_id in page_ids {
            if let Err(e) = self.free_page(page_id) {
                warn!("index {}: failed to release {}: {}", self.index_id, page_id, e);
            }
        }
    }

    fn take_reserved<'b>(reserved: &mut Vec<PageGuard<'b>>) -> Result<WritePageGuard<'b>> {
        reserved
            .pop()
            .map(PageGuard::write)
            .ok_or_else(|| StrataError::IndexCorrupted("split ran out of reserved pages".into()))
    }

    fn insert_into_leaf(
        &mut self,
        key: &[u8],
        value: RowId,
        reserved: &mut Vec<PageGuard<'_>>,
    ) -> Result<()> {
        let leaf_id = self.find_leaf(Some(key))?.page_id();

        let (parent_id, separator, new_id) = {
            let mut guard = self.bpm.fetch_page_write(leaf_id)?;
            let mut leaf = BPlusTreeLeafPage::new(guard.data_mut());
            let size = leaf.insert(key, value, |a, b| self.compare(a, b));
            if size < leaf.max_size() {
                return Ok(());
            }

            let mut new_guard = Self::take_reserved(reserved)?;
            let new_id = new_guard.page_id();
            let mut new_leaf = BPlusTreeLeafPage::new(new_guard.data_mut());
            new_leaf.init(
                new_id,
                leaf.parent_page_id(),
                leaf.key_size(),
                leaf.max_size(),
            );
            leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(new_id);
            debug!(
                "index {}: split leaf {} into {} ({} + {})",
                self.index_id,
                leaf_id,
                new_id,
                leaf.size(),
                new_leaf.size()
            );
            (leaf.parent_page_id(), new_leaf.key_at(0).to_vec(), new_id)
        };

        self.insert_into_parent(leaf_id, parent_id, &separator, new_id, reserved)
    }

    /// Links `new_id` into the parent of its left sibling `old_id`, splitting upward as
    /// needed. No latches are held on entry.
    fn insert_into_parent(
        &mut self,
        old_id: PageId,
        parent_id: PageId,
        key: &[u8],
        new_id: PageId,
        reserved: &mut Vec<PageGuard<'_>>,
    ) -> Result<()> {
        if !parent_id.is_valid() {
            let root_id = {
                let mut guard = Self::take_reserved(reserved)?;
                let root_id = guard.page_id();
                let mut root = BPlusTreeInternalPage::new(guard.data_mut());
                root.init(
                    root_id,
                    INVALID_PAGE_ID,
                    self.comparator.key_size(),
                    self.internal_max_size,
                );
                root.populate_new_root(old_id, key, new_id);
                root_id
            };
            self.set_parent(&[old_id, new_id], root_id)?;
            self.root_page_id = root_id;
            self.update_root_page_id()?;
            debug!("index {}: grew new root {}", self.index_id, root_id);
            return Ok(());
        }

        let (grandparent_id, separator, sibling_id, moved) = {
            let mut guard = self.bpm.fetch_page_write(parent_id)?;
            let mut parent = BPlusTreeInternalPage::new(guard.data_mut());
            let size = parent.insert_node_after(old_id, key, new_id)?;
            if size < parent.max_size() {
                return Ok(());
            }

            let mut sibling_guard = Self::take_reserved(reserved)?;
            let sibling_id = sibling_guard.page_id();
            let mut sibling = BPlusTreeInternalPage::new(sibling_guard.data_mut());
            sibling.init(
                sibling_id,
                parent.parent_page_id(),
                parent.key_size(),
                parent.max_size(),
            );
            let moved = parent.move_half_to(&mut sibling);
            debug!(
                "index {}: split internal {} into {} ({} + {})",
                self.index_id,
                parent_id,
                sibling_id,
                parent.size(),
                sibling.size()
            );
            (
                parent.parent_page_id(),
                sibling.key_at(0).to_vec(),
                sibling_id,
                moved,
            )
        };

        self.set_parent(&moved, sibling_id)?;
        self.insert_into_parent(parent_id, grandparent_id, &separator, sibling_id, reserved)
    }

    fn set_parent(&self, children: &[PageId], parent_id: PageId) -> Result<()> {
        for &child in children {
            let mut guard = self.bpm.fetch_page_write(child)?;
            BPlusTreePage::new(guard.data_mut()).set_parent_page_id(parent_id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    /// Removes `key` if present.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if self.is_empty() {
            return Ok(());
        }

        let leaf_id = self.find_leaf(Some(key))?.page_id();
        let (size, min_size, is_root) = {
            let mut guard = self.bpm.fetch_page_write(leaf_id)?;
            if BPlusTreeLeafPage::new(guard.data())
                .lookup(key, |a, b| self.compare(a, b))
                .is_none()
            {
                return Ok(());
            }
            let mut leaf = BPlusTreeLeafPage::new(guard.data_mut());
            let size = leaf.remove_and_delete_record(key, |a, b| self.compare(a, b));
            (size, leaf.min_size(), leaf.is_root())
        };

        if is_root {
            if size == 0 {
                self.adjust_root(leaf_id)?;
            }
        } else if size < min_size {
            self.coalesce_or_redistribute(leaf_id)?;
        }
        Ok(())
    }

    /// Rebalances an underfull non-root node with its left sibling, or its right sibling
    /// when it is the first child.
    fn coalesce_or_redistribute(&mut self, node_id: PageId) -> Result<()> {
        let (parent_id, node_size, max_size) = {
            let guard = self.bpm.fetch_page_read(node_id)?;
            let node = BPlusTreePage::new(guard.data());
            (node.parent_page_id(), node.size(), node.max_size())
        };

        let (index, sibling_id) = {
            let guard = self.bpm.fetch_page_read(parent_id)?;
            let parent = BPlusTreeInternalPage::new(guard.data());
            let index = parent.value_index(node_id).ok_or_else(|| {
                StrataError::IndexCorrupted(format!(
                    "{} missing from its parent {}",
                    node_id, parent_id
                ))
            })?;
            let sibling_index = if index == 0 { 1 } else { index - 1 };
            (index, parent.value_at(sibling_index))
        };

        let sibling_size = {
            let guard = self.bpm.fetch_page_read(sibling_id)?;
            BPlusTreePage::new(guard.data()).size()
        };

        if sibling_size + node_size >= max_size {
            return self.redistribute(node_id, sibling_id, parent_id, index);
        }

        // The right page always merges into the left one.
        if index == 0 {
            self.coalesce(node_id, sibling_id, parent_id, 1)
        } else {
            self.coalesce(sibling_id, node_id, parent_id, index)
        }
    }

    /// Moves one entry from `sibling_id` into `node_id` and fixes the separator between
    /// them. `index` is the node's slot in the parent; slot 0 means the sibling is on the
    /// right.
    fn redistribute(
        &mut self,
        node_id: PageId,
        sibling_id: PageId,
        parent_id: PageId,
        index: usize,
    ) -> Result<()> {
        let moved_child = {
            let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
            let mut node_guard = self.bpm.fetch_page_write(node_id)?;
            let mut sibling_guard = self.bpm.fetch_page_write(sibling_id)?;
            let mut parent = BPlusTreeInternalPage::new(parent_guard.data_mut());
            let separator_index = if index == 0 { 1 } else { index };
            let middle_key = parent.key_at(separator_index).to_vec();

            match (
                TreePage::new(node_guard.data_mut())?,
                TreePage::new(sibling_guard.data_mut())?,
            ) {
                (TreePage::Leaf(mut node), TreePage::Leaf(mut sibling)) => {
                    if index == 0 {
                        sibling.move_first_to_end_of(&mut node);
                        parent.set_key_at(1, sibling.key_at(0));
                    } else {
                        sibling.move_last_to_front_of(&mut node);
                        parent.set_key_at(index, node.key_at(0));
                    }
                    None
                }
                (TreePage::Internal(mut node), TreePage::Internal(mut sibling)) => {
                    let child = if index == 0 {
                        let child = sibling.move_first_to_end_of(&mut node, &middle_key);
                        parent.set_key_at(1, sibling.key_at(0));
                        child
                    } else {
                        let child = sibling.move_last_to_front_of(&mut node, &middle_key);
                        parent.set_key_at(index, node.key_at(0));
                        child
                    };
                    Some(child)
                }
                _ => {
                    return Err(StrataError::IndexCorrupted(format!(
                        "siblings {} and {} differ in page type",
                        node_id, sibling_id
                    )))
                }
            }
        };

        if let Some(child) = moved_child {
            self.set_parent(&[child], node_id)?;
        }
        debug!(
            "index {}: redistributed {} into {}",
            self.index_id, sibling_id, node_id
        );
        Ok(())
    }

    /// Merges `right_id` into its left sibling `left_id`, drops the right page, and
    /// rebalances the parent if that leaves it underfull.
    fn coalesce(
        &mut self,
        left_id: PageId,
        right_id: PageId,
        parent_id: PageId,
        right_index: usize,
    ) -> Result<()> {
        let (moved, parent_size, parent_min, parent_is_root) = {
            let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            let mut parent = BPlusTreeInternalPage::new(parent_guard.data_mut());
            let middle_key = parent.key_at(right_index).to_vec();

            let moved = match (
                TreePage::new(left_guard.data_mut())?,
                TreePage::new(right_guard.data_mut())?,
            ) {
                (TreePage::Leaf(mut left), TreePage::Leaf(mut right)) => {
                    right.move_all_to(&mut left);
                    Vec::new()
                }
                (TreePage::Internal(mut left), TreePage::Internal(mut right)) => {
                    right.move_all_to(&mut left, &middle_key)
                }
                _ => {
                    return Err(StrataError::IndexCorrupted(format!(
                        "siblings {} and {} differ in page type",
                        left_id, right_id
                    )))
                }
            };
            parent.remove(right_index);
            (moved, parent.size(), parent.min_size(), parent.is_root())
        };

        self.set_parent(&moved, left_id)?;
        self.free_page(right_id)?;
        debug!(
            "index {}: merged {} into {}",
            self.index_id, right_id, left_id
        );

        if parent_is_root {
            if parent_size == 1 {
                self.adjust_root(parent_id)?;
            }
        } else if parent_size < parent_min {
            self.coalesce_or_redistribute(parent_id)?;
        }
        Ok(())
    }

    /// Shrinks the tree at the root: an empty root leaf empties the tree, and an internal
    /// root with one child hands the root over to that child.
    fn adjust_root(&mut self, root_id: PageId) -> Result<()> {
        let new_root = {
            let mut guard = self.bpm.fetch_page_write(root_id)?;
            match TreePage::new(guard.data_mut())? {
                TreePage::Leaf(leaf) if leaf.size() == 0 => Some(INVALID_PAGE_ID),
                TreePage::Internal(mut internal) if internal.size() == 1 => {
                    Some(internal.remove_and_return_only_child())
                }
                _ => None,
            }
        };
        let Some(new_root) = new_root else {
            return Ok(());
        };

        if new_root.is_valid() {
            self.set_parent(&[new_root], INVALID_PAGE_ID)?;
        }
        self.root_page_id = new_root;
        self.update_root_page_id()?;
        self.free_page(root_id)?;
        debug!(
            "index {}: root {} replaced by {}",
            self.index_id, root_id, new_root
        );
        Ok(())
    }

    /// Frees a page of this tree, whether or not it is resident.
    fn free_page(&self, page_id: PageId) -> Result<()> {
        if !self.bpm.is_resident(page_id) {
            return self.bpm.deallocate_page(page_id);
        }
        if !self.bpm.delete_page(page_id)? {
            return Err(StrataError::PageStillPinned(page_id));
        }
        Ok(())
    }

    /// Persists the current root in the index roots page, dropping the entry when the tree
    /// is empty.
    fn update_root_page_id(&self) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(INDEX_ROOTS_PAGE_ID)?;
        let mut roots = IndexRootsPage::new(guard.data_mut());
        if !self.root_page_id.is_valid() {
            roots.delete(self.index_id);
        } else if !roots.update(self.index_id, self.root_page_id)
            && !roots.insert(self.index_id, self.root_page_id)
        {
            return Err(StrataError::IndexRootsFull);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------------

    /// Cursor at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator<'_>> {
        if self.is_empty() {
            return Ok(self.end());
        }
        let guard = self.find_leaf(None)?;
        IndexIterator::new(&self.bpm, guard, 0)
    }

    /// Cursor at the first key not less than `key`.
    pub fn begin_at(&self, key: &[u8]) -> Result<IndexIterator<'_>> {
        self.check_key(key)?;
        if self.is_empty() {
            return Ok(self.end());
        }
        let guard = self.find_leaf(Some(key))?;
        let index = BPlusTreeLeafPage::new(guard.data()).key_index(key, |a, b| self.compare(a, b));
        IndexIterator::new(&self.bpm, guard, index)
    }

    pub fn end(&self) -> IndexIterator<'_> {
        IndexIterator::end(&self.bpm)
    }

    // ---------------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------------

    /// Frees every page of the tree and forgets its root.
    pub fn destroy(&mut self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let mut pages = Vec::new();
        self.collect_pages(self.root_page_id, &mut pages)?;

        let root_id = self.root_page_id;
        self.root_page_id = INVALID_PAGE_ID;
        self.update_root_page_id()?;
        for page_id in pages {
            self.free_page(page_id)?;
        }
        debug!("index {}: destroyed tree rooted at {}", self.index_id, root_id);
        Ok(())
    }

    fn collect_pages(&self, page_id: PageId, pages: &mut Vec<PageId>) -> Result<()> {
        let children = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            match TreePage::new(guard.data())? {
                TreePage::Leaf(_) => Vec::new(),
                TreePage::Internal(internal) => {
                    (0..internal.size()).map(|i| internal.value_at(i)).collect()
                }
            }
        };
        for child in children {
            self.collect_pages(child, pages)?;
        }
        pages.push(page_id);
        Ok(())
    }

    /// Verifies the structure of the tree: key order and bounds, parent pointers, node
    /// occupancy, uniform leaf depth, the leaf chain, and that no page was left pinned.
    pub fn check(&self) -> Result<()> {
        if !self.is_empty() {
            let mut leaves = Vec::new();
            self.check_subtree(
                self.root_page_id,
                INVALID_PAGE_ID,
                None,
                None,
                &mut leaves,
            )?;
            self.check_leaf_chain(&leaves)?;
        }
        if !self.bpm.check_all_unpinned() {
            return Err(StrataError::IndexCorrupted("pages left pinned".into()));
        }
        Ok(())
    }

    /// Returns the depth of the subtree rooted at `page_id`.
    fn check_subtree(
        &self,
        page_id: PageId,
        parent_id: PageId,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        leaves: &mut Vec<(PageId, PageId)>,
    ) -> Result<usize> {
        let corrupted = |what: String| Err(StrataError::IndexCorrupted(format!("{}: {}", page_id, what)));
        let in_bounds = |key: &[u8]| {
            lower.map_or(true, |lower| self.compare(key, lower) != Ordering::Less)
                && upper.map_or(true, |upper| self.compare(key, upper) == Ordering::Less)
        };

        let guard = self.bpm.fetch_page_read(page_id)?;
        let page = TreePage::new(guard.data())?;
        let header = page.header();
        if header.page_id() != page_id {
            return corrupted(format!("header names {}", header.page_id()));
        }
        if header.parent_page_id() != parent_id {
            return corrupted(format!(
                "parent is {}, expected {}",
                header.parent_page_id(),
                parent_id
            ));
        }
        let size = header.size();
        if size >= header.max_size() {
            return corrupted(format!("size {} reaches max {}", size, header.max_size()));
        }

        match page {
            TreePage::Leaf(leaf) => {
                let min = if parent_id.is_valid() { leaf.min_size() } else { 1 };
                if size < min {
                    return corrupted(format!("leaf size {} below {}", size, min));
                }
                for i in 0..size {
                    if !in_bounds(leaf.key_at(i)) {
                        return corrupted(format!("key {} out of range", i));
                    }
                    if i > 0 && self.compare(leaf.key_at(i - 1), leaf.key_at(i)) != Ordering::Less
                    {
                        return corrupted(format!("keys {} and {} out of order", i - 1, i));
                    }
                }
                leaves.push((page_id, leaf.next_page_id()));
                Ok(1)
            }
            TreePage::Internal(internal) => {
                let min = if parent_id.is_valid() {
                    internal.min_size()
                } else {
                    2
                };
                if size < min {
                    return corrupted(format!("internal size {} below {}", size, min));
                }
                for i in 1..size {
                    if !in_bounds(internal.key_at(i)) {
                        return corrupted(format!("separator {} out of range", i));
                    }
                    if i > 1
                        && self.compare(internal.key_at(i - 1), internal.key_at(i))
                            != Ordering::Less
                    {
                        return corrupted(format!("separators {} and {} out of order", i - 1, i));
                    }
                }

                let mut depth = None;
                for i in 0..size {
                    let child_lower = if i == 0 { lower } else { Some(internal.key_at(i)) };
                    let child_upper = if i + 1 < size {
                        Some(internal.key_at(i + 1))
                    } else {
                        upper
                    };
                    let child_depth = self.check_subtree(
                        internal.value_at(i),
                        page_id,
                        child_lower,
                        child_upper,
                        leaves,
                    )?;
                    match depth {
                        None => depth = Some(child_depth),
                        Some(d) if d != child_depth => {
                            return corrupted("leaves at uneven depth".to_string())
                        }
                        Some(_) => {}
                    }
                }
                Ok(depth.unwrap_or(0) + 1)
            }
        }
    }

    fn check_leaf_chain(&self, leaves: &[(PageId, PageId)]) -> Result<()> {
        for (i, &(page_id, next)) in leaves.iter().enumerate() {
            let expected = leaves.get(i + 1).map_or(INVALID_PAGE_ID, |&(id, _)| id);
            if next != expected {
                return Err(StrataError::IndexCorrupted(format!(
                    "leaf {} links to {}, expected {}",
                    page_id, next, expected
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::index::IntegerComparator;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn setup(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
        catalog::bootstrap(&bpm).unwrap();
        (bpm, temp_file)
    }

    fn key(k: i32) -> [u8; 4] {
        IntegerComparator::encode(k)
    }

    fn rid(k: i32) -> RowId {
        RowId::new(PageId::new(k as u32), k as u32)
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let (bpm, _temp) = setup(16);
        assert!(BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 1, 4).is_err());
        assert!(BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 4, 3).is_err());
        assert!(BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 100_000, 4).is_err());
        let tree = BPlusTree::new(0, bpm, IntegerComparator, 0, 0).unwrap();
        assert_eq!(
            tree.leaf_max_size(),
            BPlusTreeLeafPage::<&[u8]>::capacity(4)
        );
    }

    #[test]
    fn test_plan_insert_counts_split_pages() {
        let (bpm, _temp) = setup(32);
        let mut tree = BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 4, 4).unwrap();
        let needed = |tree: &BPlusTree<IntegerComparator>, k: i32| {
            tree.plan_insert(&bpm, &key(k))
                .unwrap()
                .map(|(_, needed)| needed)
        };

        tree.insert(&key(1), rid(1)).unwrap();
        tree.insert(&key(2), rid(2)).unwrap();
        assert_eq!(needed(&tree, 3), Some(0));
        tree.insert(&key(3), rid(3)).unwrap();
        // A full root leaf needs a sibling and a new root.
        assert_eq!(needed(&tree, 4), Some(2));
        assert_eq!(needed(&tree, 2), None);
        assert!(bpm.check_all_unpinned());
    }

    #[test]
    fn test_reservation_failure_leaves_tree_unchanged() {
        let (bpm, _temp) = setup(4);
        let mut tree = BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 2, 4).unwrap();
        tree.insert(&key(1), rid(1)).unwrap();
        let root = tree.root_page_id();

        // Pin every frame so the split cannot get pages.
        let _held: Vec<_> = (0..3).map(|_| bpm.new_page().unwrap()).collect();
        assert!(matches!(
            tree.insert(&key(2), rid(2)),
            Err(StrataError::BufferPoolFull)
        ));
        drop(_held);

        assert_eq!(tree.root_page_id(), root);
        assert_eq!(tree.get_value(&key(2)).unwrap(), None);
        assert_eq!(tree.get_value(&key(1)).unwrap(), Some(rid(1)));
        tree.check().unwrap();
    }
}
