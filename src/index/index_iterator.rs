use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{PageId, Result, RowId, INVALID_PAGE_ID};
use crate::storage::page::BPlusTreeLeafPage;

/// Forward cursor over the leaf chain of a B+Tree.
///
/// The cursor keeps its current leaf pinned and read-latched. It borrows the tree, so the
/// tree cannot be modified while a cursor is alive. Two cursors are equal when they point at
/// the same `(leaf, slot)`; the end cursor is `(INVALID_PAGE_ID, 0)`.
pub struct IndexIterator<'a> {
    bpm: &'a BufferPoolManager,
    guard: Option<ReadPageGuard<'a>>,
    index: usize,
}

impl<'a> IndexIterator<'a> {
    /// Positions at `index` of the leaf in `guard`, skipping forward past exhausted leaves.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        guard: ReadPageGuard<'a>,
        index: usize,
    ) -> Result<Self> {
        let mut iter = Self {
            bpm,
            guard: Some(guard),
            index,
        };
        iter.skip_exhausted()?;
        Ok(iter)
    }

    pub(crate) fn end(bpm: &'a BufferPoolManager) -> Self {
        Self {
            bpm,
            guard: None,
            index: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Leaf the cursor points into, `INVALID_PAGE_ID` at the end.
    pub fn page_id(&self) -> PageId {
        self.guard
            .as_ref()
            .map_or(INVALID_PAGE_ID, |guard| guard.page_id())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Key and row id under the cursor.
    pub fn current(&self) -> Option<(&[u8], RowId)> {
        let data = self.guard.as_ref()?.data();
        let leaf = BPlusTreeLeafPage::new(data);
        let offset = leaf.pair_offset(self.index);
        Some((
            &data[offset..offset + leaf.key_size()],
            leaf.value_at(self.index),
        ))
    }

    /// Moves to the next slot, following the leaf chain when this leaf is done.
    pub fn advance(&mut self) -> Result<()> {
        if self.guard.is_some() {
            self.index += 1;
            self.skip_exhausted()?;
        }
        Ok(())
    }

    /// Returns the entry under the cursor and advances past it.
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, RowId)>> {
        let entry = match self.current() {
            Some((key, value)) => (key.to_vec(), value),
            None => return Ok(None),
        };
        if let Err(e) = self.advance() {
            self.guard = None;
            self.index = 0;
            return Err(e);
        }
        Ok(Some(entry))
    }

    fn skip_exhausted(&mut self) -> Result<()> {
        while let Some(guard) = self.guard.as_ref() {
            let leaf = BPlusTreeLeafPage::new(guard.data());
            if self.index < leaf.size() {
                return Ok(());
            }
            let next = leaf.next_page_id();
            // Pin the next leaf before releasing this one.
            self.guard = if next.is_valid() {
                Some(self.bpm.fetch_page_read(next)?)
            } else {
                None
            };
            self.index = 0;
        }
        Ok(())
    }
}

impl PartialEq for IndexIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.page_id() == other.page_id() && self.index == other.index
    }
}

impl Iterator for IndexIterator<'_> {
    type Item = Result<(Vec<u8>, RowId)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
