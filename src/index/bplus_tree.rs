use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{
    PageId, RecordId, Result, TarnError, DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE,
    INVALID_PAGE_ID,
};

use super::btree_page::{
    BTreePageKind, BTreePageRef, HeaderPage, HeaderPageRef, InternalPage, InternalPageRef,
    LeafPage, LeafPageRef,
};
use super::index_iterator::IndexIterator;

/// Ancestor write guards retained during a mutating descent. The header
/// guard is kept while the root might still change; each write-set entry
/// pairs a latched internal page with the child index the descent took.
#[derive(Default)]
struct Context {
    header: Option<WritePageGuard>,
    write_set: VecDeque<(WritePageGuard, usize)>,
}

impl Context {
    /// Releases every retained ancestor. Called when the current node is
    /// safe: any structure change below it can no longer reach them.
    fn release_all(&mut self) {
        self.header = None;
        self.write_set.clear();
    }
}

/// A disk-resident B+tree mapping unique `u32` keys to record IDs.
///
/// All pages are reached through the buffer pool; concurrency uses latch
/// crabbing. Readers hold at most one page latch after passing the header;
/// writers retain the chain of unsafe ancestors so splits and merges can
/// propagate, and release it the moment a safe node is reached.
pub struct BPlusTree {
    bpm: Arc<BufferPoolManager>,
    header_page_id: PageId,
    leaf_max_size: u16,
    internal_max_size: u16,
}

impl BPlusTree {
    /// Creates an empty tree, allocating its header page.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: u16,
        internal_max_size: u16,
    ) -> Result<Self> {
        assert!(leaf_max_size >= 3, "leaf_max_size must be at least 3");
        assert!(internal_max_size >= 3, "internal_max_size must be at least 3");

        let mut guard = bpm.new_page_guarded()?.upgrade_write();
        let header_page_id = guard.page_id();
        HeaderPage::new(guard.data_mut()).init();
        drop(guard);

        Ok(Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
        })
    }

    /// Creates an empty tree with the default fanouts.
    pub fn with_defaults(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        Self::new(bpm, DEFAULT_LEAF_MAX_SIZE, DEFAULT_INTERNAL_MAX_SIZE)
    }

    /// Re-attaches to a tree whose header page already exists on disk.
    /// Fails if the page at `header_page_id` is not a tree header.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        header_page_id: PageId,
        leaf_max_size: u16,
        internal_max_size: u16,
    ) -> Result<Self> {
        let guard = bpm.fetch_page_read(header_page_id)?;
        if BTreePageRef::new(guard.data()).kind() != BTreePageKind::Header {
            return Err(TarnError::PageNotFound(header_page_id));
        }
        drop(guard);

        Ok(Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(HeaderPageRef::new(guard.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root_page_id()? == INVALID_PAGE_ID)
    }

    /// Point lookup. Crabs read latches down the tree: the child is
    /// latched before the parent latch drops.
    pub fn get_value(&self, key: u32) -> Result<Option<RecordId>> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = HeaderPageRef::new(header.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                let leaf = LeafPageRef::new(guard.data());
                return Ok(leaf.lookup(key).map(|pos| leaf.value_at(pos)));
            }
            let child = {
                let internal = InternalPageRef::new(guard.data());
                internal.value_at(internal.child_index(key))
            };
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    /// A node is insert-safe when one more entry cannot overflow it.
    fn is_insert_safe(page: &BTreePageRef<'_>) -> bool {
        page.size() + 1 <= page.max_size()
    }

    /// Internal pages underflow when they drop below this many children.
    /// At small fanouts `max_size / 2` would allow one-child pages, which
    /// have no sibling to repair through, so two is the floor.
    fn internal_min_children(&self) -> u16 {
        (self.internal_max_size / 2).max(2)
    }

    /// A node is remove-safe when one fewer entry cannot underflow it.
    /// The root obeys looser rules: it only becomes unsafe when the next
    /// removal could empty it (leaf) or collapse it (internal).
    fn is_remove_safe(&self, page: &BTreePageRef<'_>, is_root: bool) -> bool {
        if is_root {
            if page.is_leaf() {
                page.size() > 1
            } else {
                page.size() > 2
            }
        } else if page.is_leaf() {
            page.size() > page.min_size()
        } else {
            page.size() > self.internal_min_children()
        }
    }

    /// Inserts a key/value pair. Returns false if the key already exists.
    pub fn insert(&self, key: u32, value: RecordId) -> Result<bool> {
        let mut ctx = Context::default();
        let mut header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = HeaderPageRef::new(header.data()).root_page_id();

        if root_id == INVALID_PAGE_ID {
            let mut root = self.bpm.new_page_guarded()?.upgrade_write();
            let root_pid = root.page_id();
            let mut leaf = LeafPage::new(root.data_mut());
            leaf.init(self.leaf_max_size);
            leaf.insert_at(0, key, value);
            HeaderPage::new(header.data_mut()).set_root_page_id(root_pid);
            debug!(root = root_pid.as_u32(), "started new tree");
            return Ok(true);
        }
        ctx.header = Some(header);

        let mut guard = self.bpm.fetch_page_write(root_id)?;
        loop {
            let page = BTreePageRef::new(guard.data());
            if Self::is_insert_safe(&page) {
                ctx.release_all();
            }
            if page.is_leaf() {
                break;
            }
            let (child, idx) = {
                let internal = InternalPageRef::new(guard.data());
                let idx = internal.child_index(key);
                (internal.value_at(idx), idx)
            };
            ctx.write_set.push_back((guard, idx));
            guard = self.bpm.fetch_page_write(child)?;
        }

        let insert_pos = {
            let leaf = LeafPageRef::new(guard.data());
            if leaf.lookup(key).is_some() {
                return Ok(false);
            }
            leaf.position_for(key)
        };

        if Self::is_insert_safe(&BTreePageRef::new(guard.data())) {
            LeafPage::new(guard.data_mut()).insert_at(insert_pos, key, value);
            return Ok(true);
        }

        // Leaf overflow: split, then bubble the separator up the retained
        // ancestors, splitting those that are full as well.
        let mut split_origin = guard.page_id();
        let (mut sep_key, mut right_pid) = self.split_leaf(&mut guard, insert_pos, key, value)?;
        drop(guard);
        debug!(
            page = split_origin.as_u32(),
            right = right_pid.as_u32(),
            "split leaf"
        );

        while let Some((mut parent, _)) = ctx.write_set.pop_back() {
            let idx = {
                let internal = InternalPageRef::new(parent.data());
                internal.child_index(sep_key) + 1
            };
            if Self::is_insert_safe(&BTreePageRef::new(parent.data())) {
                InternalPage::new(parent.data_mut()).insert_at(idx, sep_key, right_pid);
                return Ok(true);
            }
            split_origin = parent.page_id();
            let (next_sep, next_right) = self.split_internal(&mut parent, idx, sep_key, right_pid)?;
            sep_key = next_sep;
            right_pid = next_right;
            drop(parent);
            debug!(
                page = split_origin.as_u32(),
                right = right_pid.as_u32(),
                "split internal"
            );
        }

        // The split reached the tracked root: grow the tree by one level.
        // The header guard is necessarily still held, since no safe node
        // was seen on the way down.
        if let Some(mut header) = ctx.header.take() {
            let mut root = self.bpm.new_page_guarded()?.upgrade_write();
            let new_root_id = root.page_id();
            let mut internal = InternalPage::new(root.data_mut());
            internal.init(self.internal_max_size);
            internal.set_size(2);
            internal.set_value_at(0, split_origin);
            internal.set_key_at(1, sep_key);
            internal.set_value_at(1, right_pid);
            HeaderPage::new(header.data_mut()).set_root_page_id(new_root_id);
            debug!(root = new_root_id.as_u32(), "root split");
        }
        Ok(true)
    }

    /// Splits a full leaf, moving its rightmost `min_size` entries to a
    /// fresh right sibling, splicing the sibling chain, and inserting the
    /// pending entry on whichever side it belongs. Returns the separator
    /// (the right sibling's first key) and the new page's ID.
    fn split_leaf(
        &self,
        left_guard: &mut WritePageGuard,
        insert_pos: usize,
        key: u32,
        value: RecordId,
    ) -> Result<(u32, PageId)> {
        let mut right_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let right_pid = right_guard.page_id();

        let mut left = LeafPage::new(left_guard.data_mut());
        let mut right = LeafPage::new(right_guard.data_mut());
        right.init(self.leaf_max_size);

        let old_size = left.size() as usize;
        let move_count = left.min_size() as usize;
        let keep = old_size - move_count;

        for i in 0..move_count {
            right.set_entry_at(i, left.key_at(keep + i), left.value_at(keep + i));
        }
        right.set_size(move_count as u16);
        left.set_size(keep as u16);

        right.set_next_page_id(left.next_page_id());
        left.set_next_page_id(right_pid);

        if insert_pos >= keep {
            right.insert_at(insert_pos - keep, key, value);
        } else {
            left.insert_at(insert_pos, key, value);
        }

        Ok((right.key_at(0), right_pid))
    }

    /// Splits a full internal page the same way, inserting the pending
    /// (separator, child) slot on the proper side. The new right page's
    /// slot-0 key is the separator to push up.
    fn split_internal(
        &self,
        left_guard: &mut WritePageGuard,
        insert_idx: usize,
        key: u32,
        child: PageId,
    ) -> Result<(u32, PageId)> {
        let mut right_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let right_pid = right_guard.page_id();

        let mut left = InternalPage::new(left_guard.data_mut());
        let mut right = InternalPage::new(right_guard.data_mut());
        right.init(self.internal_max_size);

        let old_size = left.size() as usize;
        let move_count = left.min_size() as usize;
        let keep = old_size - move_count;

        for i in 0..move_count {
            right.set_key_at(i, left.key_at(keep + i));
            right.set_value_at(i, left.value_at(keep + i));
        }
        right.set_size(move_count as u16);
        left.set_size(keep as u16);

        if insert_idx >= keep {
            right.insert_at(insert_idx - keep, key, child);
        } else {
            left.insert_at(insert_idx, key, child);
        }

        Ok((right.key_at(0), right_pid))
    }

    /// Removes a key, if present. Underflowing nodes first try to borrow
    /// an entry from a sibling and fall back to merging with one; merges
    /// propagate up the retained ancestors, possibly collapsing the root.
    pub fn remove(&self, key: u32) -> Result<()> {
        let mut ctx = Context::default();
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = HeaderPageRef::new(header.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(());
        }
        ctx.header = Some(header);

        let mut guard = self.bpm.fetch_page_write(root_id)?;
        let mut is_root = true;
        loop {
            let page = BTreePageRef::new(guard.data());
            if self.is_remove_safe(&page, is_root) {
                ctx.release_all();
            }
            if page.is_leaf() {
                break;
            }
            let (child, idx) = {
                let internal = InternalPageRef::new(guard.data());
                let idx = internal.child_index(key);
                (internal.value_at(idx), idx)
            };
            ctx.write_set.push_back((guard, idx));
            guard = self.bpm.fetch_page_write(child)?;
            is_root = false;
        }

        let Some(pos) = LeafPageRef::new(guard.data()).lookup(key) else {
            return Ok(());
        };
        let leaf_size = {
            let mut leaf = LeafPage::new(guard.data_mut());
            leaf.remove_at(pos);
            leaf.size()
        };

        if ctx.write_set.is_empty() {
            // The leaf is the root; it may shrink freely, and an empty
            // root empties the tree.
            if leaf_size == 0 {
                if let Some(mut header) = ctx.header.take() {
                    HeaderPage::new(header.data_mut()).set_root_page_id(INVALID_PAGE_ID);
                    let pid = guard.page_id();
                    drop(guard);
                    self.bpm.delete_page(pid)?;
                    debug!("tree emptied");
                }
            }
            return Ok(());
        }

        if leaf_size >= self.leaf_max_size / 2 {
            return Ok(());
        }

        let Some((mut parent, idx)) = ctx.write_set.pop_back() else {
            return Ok(());
        };
        if !self.fix_leaf_underflow(&mut parent, idx, guard)? {
            return Ok(());
        }

        // A leaf merge removed a slot from `parent`; keep fixing
        // underflows up the retained chain.
        let mut cur = parent;
        loop {
            let cur_size = InternalPageRef::new(cur.data()).size();
            match ctx.write_set.pop_back() {
                None => {
                    // `cur` is the topmost retained node. If it is the
                    // root and a single child remains, drop a level.
                    if let Some(mut header) = ctx.header.take() {
                        if cur_size == 1 {
                            let only_child = InternalPageRef::new(cur.data()).value_at(0);
                            HeaderPage::new(header.data_mut()).set_root_page_id(only_child);
                            let pid = cur.page_id();
                            drop(cur);
                            self.bpm.delete_page(pid)?;
                            debug!(root = only_child.as_u32(), "collapsed root");
                        }
                    }
                    return Ok(());
                }
                Some((mut parent, parent_idx)) => {
                    if cur_size >= self.internal_min_children() {
                        return Ok(());
                    }
                    if !self.fix_internal_underflow(&mut parent, parent_idx, cur)? {
                        return Ok(());
                    }
                    cur = parent;
                }
            }
        }
    }

    /// Repairs an underflowing leaf (`cur`, at child slot `idx` of the
    /// latched `parent`). Returns true when a merge removed a parent slot.
    fn fix_leaf_underflow(
        &self,
        parent: &mut WritePageGuard,
        idx: usize,
        mut cur: WritePageGuard,
    ) -> Result<bool> {
        let parent_size = InternalPageRef::new(parent.data()).size() as usize;
        let min = self.leaf_max_size / 2;

        // Borrow the left sibling's last entry.
        if idx > 0 {
            let left_pid = InternalPageRef::new(parent.data()).value_at(idx - 1);
            let mut left_guard = self.bpm.fetch_page_write(left_pid)?;
            let left_size = LeafPageRef::new(left_guard.data()).size() as usize;
            if left_size as u16 > min {
                let (k, v) = {
                    let left = LeafPageRef::new(left_guard.data());
                    (left.key_at(left_size - 1), left.value_at(left_size - 1))
                };
                LeafPage::new(left_guard.data_mut()).remove_at(left_size - 1);
                LeafPage::new(cur.data_mut()).insert_at(0, k, v);
                InternalPage::new(parent.data_mut()).set_key_at(idx, k);
                return Ok(false);
            }
        }

        // Borrow the right sibling's first entry.
        if idx + 1 < parent_size {
            let right_pid = InternalPageRef::new(parent.data()).value_at(idx + 1);
            let mut right_guard = self.bpm.fetch_page_write(right_pid)?;
            let right_size = LeafPageRef::new(right_guard.data()).size() as usize;
            if right_size as u16 > min {
                let (k, v) = {
                    let right = LeafPageRef::new(right_guard.data());
                    (right.key_at(0), right.value_at(0))
                };
                LeafPage::new(right_guard.data_mut()).remove_at(0);
                let cur_size = LeafPageRef::new(cur.data()).size() as usize;
                LeafPage::new(cur.data_mut()).insert_at(cur_size, k, v);
                let new_sep = LeafPageRef::new(right_guard.data()).key_at(0);
                InternalPage::new(parent.data_mut()).set_key_at(idx + 1, new_sep);
                return Ok(false);
            }
        }

        // No sibling can spare an entry: merge.
        if idx > 0 {
            // Fold `cur` into its left sibling and splice it out of the chain.
            let left_pid = InternalPageRef::new(parent.data()).value_at(idx - 1);
            let mut left_guard = self.bpm.fetch_page_write(left_pid)?;
            {
                let cur_ref = LeafPageRef::new(cur.data());
                let mut left = LeafPage::new(left_guard.data_mut());
                let base = left.size() as usize;
                let cur_size = cur_ref.size() as usize;
                for i in 0..cur_size {
                    left.set_entry_at(base + i, cur_ref.key_at(i), cur_ref.value_at(i));
                }
                left.set_size((base + cur_size) as u16);
                left.set_next_page_id(cur_ref.next_page_id());
            }
            let pid = cur.page_id();
            drop(cur);
            self.bpm.delete_page(pid)?;
            InternalPage::new(parent.data_mut()).remove_at(idx);
            debug!(merged = pid.as_u32(), into = left_pid.as_u32(), "merged leaves");
        } else {
            // Leftmost child: fold the right sibling into `cur` instead.
            let right_pid = InternalPageRef::new(parent.data()).value_at(idx + 1);
            let right_guard = self.bpm.fetch_page_write(right_pid)?;
            {
                let right = LeafPageRef::new(right_guard.data());
                let mut c = LeafPage::new(cur.data_mut());
                let base = c.size() as usize;
                let right_size = right.size() as usize;
                for i in 0..right_size {
                    c.set_entry_at(base + i, right.key_at(i), right.value_at(i));
                }
                c.set_size((base + right_size) as u16);
                c.set_next_page_id(right.next_page_id());
            }
            drop(right_guard);
            self.bpm.delete_page(right_pid)?;
            InternalPage::new(parent.data_mut()).remove_at(idx + 1);
            debug!(
                merged = right_pid.as_u32(),
                into = cur.page_id().as_u32(),
                "merged leaves"
            );
        }
        Ok(true)
    }

    /// Repairs an underflowing internal node; same shape as the leaf
    /// version, except separators rotate through the parent.
    fn fix_internal_underflow(
        &self,
        parent: &mut WritePageGuard,
        idx: usize,
        mut cur: WritePageGuard,
    ) -> Result<bool> {
        let parent_size = InternalPageRef::new(parent.data()).size() as usize;
        let min = self.internal_min_children();

        // Borrow from the left sibling: its last child moves to the front
        // of `cur`, and the parent separator rotates.
        if idx > 0 {
            let left_pid = InternalPageRef::new(parent.data()).value_at(idx - 1);
            let mut left_guard = self.bpm.fetch_page_write(left_pid)?;
            let left_size = InternalPageRef::new(left_guard.data()).size() as usize;
            if left_size as u16 > min {
                let (borrowed_key, borrowed_child) = {
                    let left = InternalPageRef::new(left_guard.data());
                    (left.key_at(left_size - 1), left.value_at(left_size - 1))
                };
                let old_sep = InternalPageRef::new(parent.data()).key_at(idx);
                {
                    let mut c = InternalPage::new(cur.data_mut());
                    c.insert_at(0, borrowed_key, borrowed_child);
                    // The old separator now divides the borrowed child
                    // from the previous first child.
                    c.set_key_at(1, old_sep);
                }
                InternalPage::new(left_guard.data_mut()).remove_at(left_size - 1);
                InternalPage::new(parent.data_mut()).set_key_at(idx, borrowed_key);
                return Ok(false);
            }
        }

        // Borrow from the right sibling: its first child joins the end of
        // `cur` under the parent separator.
        if idx + 1 < parent_size {
            let right_pid = InternalPageRef::new(parent.data()).value_at(idx + 1);
            let mut right_guard = self.bpm.fetch_page_write(right_pid)?;
            let right_size = InternalPageRef::new(right_guard.data()).size() as usize;
            if right_size as u16 > min {
                let sep = InternalPageRef::new(parent.data()).key_at(idx + 1);
                let first_child = InternalPageRef::new(right_guard.data()).value_at(0);
                let cur_size = InternalPageRef::new(cur.data()).size() as usize;
                InternalPage::new(cur.data_mut()).insert_at(cur_size, sep, first_child);
                let new_sep = InternalPageRef::new(right_guard.data()).key_at(1);
                InternalPage::new(right_guard.data_mut()).remove_at(0);
                InternalPage::new(parent.data_mut()).set_key_at(idx + 1, new_sep);
                return Ok(false);
            }
        }

        // Merge, pulling the parent separator down as the joining key.
        if idx > 0 {
            let left_pid = InternalPageRef::new(parent.data()).value_at(idx - 1);
            let mut left_guard = self.bpm.fetch_page_write(left_pid)?;
            let sep = InternalPageRef::new(parent.data()).key_at(idx);
            {
                let cur_ref = InternalPageRef::new(cur.data());
                let mut left = InternalPage::new(left_guard.data_mut());
                let base = left.size() as usize;
                let cur_size = cur_ref.size() as usize;
                for i in 0..cur_size {
                    let k = if i == 0 { sep } else { cur_ref.key_at(i) };
                    left.set_key_at(base + i, k);
                    left.set_value_at(base + i, cur_ref.value_at(i));
                }
                left.set_size((base + cur_size) as u16);
            }
            let pid = cur.page_id();
            drop(cur);
            self.bpm.delete_page(pid)?;
            InternalPage::new(parent.data_mut()).remove_at(idx);
            debug!(
                merged = pid.as_u32(),
                into = left_pid.as_u32(),
                "merged internal pages"
            );
        } else {
            let right_pid = InternalPageRef::new(parent.data()).value_at(idx + 1);
            let right_guard = self.bpm.fetch_page_write(right_pid)?;
            let sep = InternalPageRef::new(parent.data()).key_at(idx + 1);
            {
                let right = InternalPageRef::new(right_guard.data());
                let mut c = InternalPage::new(cur.data_mut());
                let base = c.size() as usize;
                let right_size = right.size() as usize;
                for i in 0..right_size {
                    let k = if i == 0 { sep } else { right.key_at(i) };
                    c.set_key_at(base + i, k);
                    c.set_value_at(base + i, right.value_at(i));
                }
                c.set_size((base + right_size) as u16);
            }
            drop(right_guard);
            self.bpm.delete_page(right_pid)?;
            InternalPage::new(parent.data_mut()).remove_at(idx + 1);
            debug!(
                merged = right_pid.as_u32(),
                into = cur.page_id().as_u32(),
                "merged internal pages"
            );
        }
        Ok(true)
    }

    /// Iterator positioned at the first entry of the leftmost leaf.
    pub fn begin(&self) -> Result<IndexIterator> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = HeaderPageRef::new(header.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(self.end());
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                return Ok(IndexIterator::new(Arc::clone(&self.bpm), Some(guard), 0));
            }
            let child = InternalPageRef::new(guard.data()).value_at(0);
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    /// Iterator positioned at `key`, or the end iterator if it is absent.
    pub fn begin_from(&self, key: u32) -> Result<IndexIterator> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = HeaderPageRef::new(header.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(self.end());
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                let pos = LeafPageRef::new(guard.data()).lookup(key);
                return Ok(match pos {
                    Some(pos) => IndexIterator::new(Arc::clone(&self.bpm), Some(guard), pos),
                    None => self.end(),
                });
            }
            let child = {
                let internal = InternalPageRef::new(guard.data());
                internal.value_at(internal.child_index(key))
            };
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    /// The past-the-end iterator.
    pub fn end(&self) -> IndexIterator {
        IndexIterator::new(Arc::clone(&self.bpm), None, 0)
    }
}
