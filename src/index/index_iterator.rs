use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{PageId, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::LeafPageRef;

/// Forward iterator over a B+tree's entries in key order.
///
/// The iterator keeps a read latch (and pin) on the leaf it is positioned
/// in; crossing to the next leaf swaps in that leaf's guard, releasing the
/// previous one. The end iterator holds no guard and reports the invalid
/// page id, so two iterators compare equal iff they sit on the same
/// (page, slot) position.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    guard: Option<ReadPageGuard>,
    pos: usize,
}

impl IndexIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, guard: Option<ReadPageGuard>, pos: usize) -> Self {
        Self { bpm, guard, pos }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    pub fn page_id(&self) -> PageId {
        self.guard
            .as_ref()
            .map(|g| g.page_id())
            .unwrap_or(INVALID_PAGE_ID)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The entry under the cursor, or None at the end.
    pub fn entry(&self) -> Option<(u32, RecordId)> {
        let guard = self.guard.as_ref()?;
        let leaf = LeafPageRef::new(guard.data());
        Some((leaf.key_at(self.pos), leaf.value_at(self.pos)))
    }

    /// Moves to the next entry, following the leaf chain when the current
    /// leaf is exhausted. Advancing the end iterator is a no-op.
    pub fn advance(&mut self) -> Result<()> {
        let next = {
            let Some(guard) = self.guard.as_ref() else {
                return Ok(());
            };
            let leaf = LeafPageRef::new(guard.data());
            self.pos += 1;
            if self.pos < leaf.size() as usize {
                return Ok(());
            }
            leaf.next_page_id()
        };

        self.pos = 0;
        if next == INVALID_PAGE_ID {
            self.guard = None;
        } else {
            self.guard = Some(self.bpm.fetch_page_read(next)?);
        }
        Ok(())
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        self.page_id() == other.page_id() && self.pos == other.pos
    }
}

impl Eq for IndexIterator {}

impl Iterator for IndexIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entry()?;
        match self.advance() {
            Ok(()) => Some(Ok(entry)),
            Err(e) => Some(Err(e)),
        }
    }
}
