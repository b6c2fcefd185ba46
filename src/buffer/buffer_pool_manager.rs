use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{
    FrameId, PageId, Result, TarnError, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K, INVALID_PAGE_ID,
    PAGE_SIZE,
};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{AccessType, BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Bookkeeping guarded by the pool-wide metadata latch.
struct PoolState {
    /// Maps resident page IDs to the frames holding them
    page_table: HashMap<PageId, FrameId>,
    /// Frames not bound to any page
    free_list: VecDeque<FrameId>,
}

/// State shared between the manager and outstanding page guards.
pub(crate) struct PoolCore {
    frames: Vec<Arc<FrameHeader>>,
    state: Mutex<PoolState>,
    replacer: LruKReplacer,
}

impl PoolCore {
    /// Decrements a page's pin count, ORs in the dirty flag, and marks the
    /// frame evictable when the count reaches zero. Returns false if the
    /// page is not resident or not pinned.
    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == Some(0) {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }
}

/// BufferPoolManager caches disk pages in a fixed set of in-memory frames.
///
/// Pages are pinned while referenced (normally through a page guard) and
/// become eviction candidates once every pin is released; victims are
/// chosen by an LRU-K replacer. The metadata latch serializes the page
/// table, the free list, and all pin transitions, and is never held across
/// disk I/O.
pub struct BufferPoolManager {
    pool_size: usize,
    /// Source of fresh page IDs; deallocation is delegated to the disk manager
    next_page_id: AtomicU32,
    core: Arc<PoolCore>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a pool with `pool_size` frames and an LRU-K replacer of the
    /// given history depth.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        assert!(pool_size >= 1, "buffer pool needs at least one frame");

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            next_page_id: AtomicU32::new(0),
            core: Arc::new(PoolCore {
                frames,
                state: Mutex::new(PoolState {
                    page_table: HashMap::new(),
                    free_list,
                }),
                replacer: LruKReplacer::new(replacer_k, pool_size),
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Creates a pool with the default frame count and LRU-K depth.
    pub fn with_defaults(disk_manager: Arc<DiskManager>) -> Self {
        Self::new(DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K, disk_manager)
    }

    /// Allocates a fresh page ID, binds it to a frame, and pins it once.
    /// The caller owns that pin and must release it with [`unpin_page`]
    /// (or use [`new_page_guarded`] instead).
    ///
    /// [`unpin_page`]: Self::unpin_page
    /// [`new_page_guarded`]: Self::new_page_guarded
    pub fn new_page(&self) -> Result<PageId> {
        self.new_page_inner().map(|(page_id, _)| page_id)
    }

    /// Like [`new_page`](Self::new_page), but hands the pin to a guard.
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard> {
        let (page_id, frame) = self.new_page_inner()?;
        Ok(BasicPageGuard::new(Arc::clone(&self.core), frame, page_id))
    }

    fn new_page_inner(&self) -> Result<(PageId, Arc<FrameHeader>)> {
        let frame_id = self.acquire_frame()?;
        let frame = Arc::clone(&self.core.frames[frame_id.as_usize()]);

        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed));
        frame.set_page_id(page_id);
        frame.pin();

        let mut state = self.core.state.lock();
        state.page_table.insert(page_id, frame_id);
        self.core.replacer.record_access(frame_id, AccessType::Unknown);
        self.core.replacer.set_evictable(frame_id, false);
        drop(state);

        trace!(page_id = page_id.as_u32(), frame_id = frame_id.as_u32(), "allocated page");
        Ok((page_id, frame))
    }

    /// Fetches a page without latching it.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame = self.fetch_frame(page_id)?;
        Ok(BasicPageGuard::new(Arc::clone(&self.core), frame, page_id))
    }

    /// Fetches a page under its shared latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Fetches a page under its exclusive latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// Releases one pin on a page. See [`PoolCore::unpin_page`] semantics:
    /// the dirty flag is sticky, and the frame becomes evictable at zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.core.unpin_page(page_id, is_dirty)
    }

    /// Writes a resident page back to disk and clears its dirty bit,
    /// regardless of pin count. Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame = {
            let state = self.core.state.lock();
            match state.page_table.get(&page_id) {
                Some(&frame_id) => Arc::clone(&self.core.frames[frame_id.as_usize()]),
                None => return Ok(false),
            }
        };

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = {
            let state = self.core.state.lock();
            state.page_table.keys().copied().collect()
        };
        for page_id in resident {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drops a page from the pool and returns its ID to the allocator.
    /// A page that is not resident counts as already deleted (`true`);
    /// a pinned page cannot be deleted (`false`).
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let dirty_image = {
            let mut state = self.core.state.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(true);
            };
            let frame = &self.core.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                return Ok(false);
            }

            let image = if frame.is_dirty() {
                let mut data = Box::new([0u8; PAGE_SIZE]);
                frame.copy_to(&mut data[..]);
                Some(data)
            } else {
                None
            };

            state.page_table.remove(&page_id);
            self.core.replacer.remove(frame_id);
            frame.reset();
            state.free_list.push_back(frame_id);
            image
        };

        if let Some(data) = dirty_image {
            self.disk_scheduler.schedule_write_sync(page_id, &data[..])?;
        }
        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
        debug!(page_id = page_id.as_u32(), "deleted page");
        Ok(true)
    }

    /// Returns the pin count of a resident page, or None if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.core.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.core.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.core.state.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Makes `page_id` resident and pinned, reading it from disk on a miss.
    ///
    /// The metadata latch is dropped around the disk read, so two threads
    /// can race to load the same page; the loser detects the published
    /// mapping afterwards, recycles its own frame, and adopts the winner's.
    fn fetch_frame(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if page_id == INVALID_PAGE_ID {
            return Err(TarnError::InvalidPageId(page_id));
        }

        // Fast path: already resident.
        {
            let state = self.core.state.lock();
            if let Some(&frame_id) = state.page_table.get(&page_id) {
                let frame = &self.core.frames[frame_id.as_usize()];
                if frame.pin() == 1 {
                    self.core.replacer.set_evictable(frame_id, false);
                }
                self.core.replacer.record_access(frame_id, AccessType::Lookup);
                return Ok(Arc::clone(frame));
            }
        }

        debug!(page_id = page_id.as_u32(), "buffer pool miss, loading from disk");
        let frame_id = self.acquire_frame()?;
        let frame = Arc::clone(&self.core.frames[frame_id.as_usize()]);

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;
        frame.copy_from(&data);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        let mut state = self.core.state.lock();
        if let Some(&existing) = state.page_table.get(&page_id) {
            // Lost the race: another thread loaded the page while we did
            // I/O. Recycle our frame and share the registered one.
            trace!(page_id = page_id.as_u32(), "concurrent fetch, adopting existing frame");
            frame.reset();
            state.free_list.push_back(frame_id);

            let winner = &self.core.frames[existing.as_usize()];
            if winner.pin() == 1 {
                self.core.replacer.set_evictable(existing, false);
            }
            self.core.replacer.record_access(existing, AccessType::Lookup);
            return Ok(Arc::clone(winner));
        }

        state.page_table.insert(page_id, frame_id);
        self.core.replacer.record_access(frame_id, AccessType::Lookup);
        self.core.replacer.set_evictable(frame_id, false);
        Ok(frame)
    }

    /// Returns an unbound frame, evicting a victim if the free list is
    /// empty. Any dirty victim is written back after the metadata latch is
    /// released.
    fn acquire_frame(&self) -> Result<FrameId> {
        let (frame_id, write_back) = {
            let mut state = self.core.state.lock();
            if let Some(frame_id) = state.free_list.pop_front() {
                return Ok(frame_id);
            }

            let Some(frame_id) = self.core.replacer.evict() else {
                return Err(TarnError::BufferPoolFull);
            };
            let frame = &self.core.frames[frame_id.as_usize()];
            let old_page_id = frame.page_id();
            debug!(
                victim = old_page_id.as_u32(),
                frame_id = frame_id.as_u32(),
                "evicting page"
            );

            if old_page_id != INVALID_PAGE_ID {
                state.page_table.remove(&old_page_id);
            }
            let write_back = if frame.is_dirty() && old_page_id != INVALID_PAGE_ID {
                let mut data = Box::new([0u8; PAGE_SIZE]);
                frame.copy_to(&mut data[..]);
                Some((old_page_id, data))
            } else {
                None
            };
            frame.reset();
            (frame_id, write_back)
        };

        if let Some((old_page_id, data)) = write_back {
            self.disk_scheduler.schedule_write_sync(old_page_id, &data[..])?;
        }
        Ok(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_new_pool() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_pool_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::with_defaults(dm);
        assert_eq!(bpm.pool_size(), DEFAULT_BUFFER_POOL_SIZE);
        assert_eq!(bpm.free_frame_count(), DEFAULT_BUFFER_POOL_SIZE);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);

        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_unpin_semantics() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap();
        assert!(bpm.unpin_page(page_id, false));
        // Second unpin has nothing to release.
        assert!(!bpm.unpin_page(page_id, false));
        // Unknown page.
        assert!(!bpm.unpin_page(PageId::new(999), false));
    }

    #[test]
    fn test_fetch_unpin_leaves_table_unchanged() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap();
        bpm.unpin_page(page_id, false);
        let before = bpm.free_frame_count();

        let guard = bpm.fetch_page_read(page_id).unwrap();
        drop(guard);

        assert_eq!(bpm.free_frame_count(), before);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap();

        // Pinned pages cannot be deleted.
        assert!(!bpm.delete_page(page_id).unwrap());
        bpm.unpin_page(page_id, false);

        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);

        // Deleting a page that is not resident succeeds trivially.
        assert!(bpm.delete_page(PageId::new(500)).unwrap());
    }

    #[test]
    fn test_pool_exhaustion() {
        let (bpm, _temp) = create_bpm(2);

        let _p0 = bpm.new_page().unwrap();
        let _p1 = bpm.new_page().unwrap();

        // Both frames pinned: nothing to evict.
        assert!(matches!(bpm.new_page(), Err(TarnError::BufferPoolFull)));
    }

    #[test]
    fn test_flush_clears_dirty_and_preserves_data() {
        let (bpm, temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap();
        bpm.unpin_page(page_id, false);
        {
            let mut guard = bpm.fetch_page_write(page_id).unwrap();
            guard.data_mut()[0] = 0xAB;
        }
        assert!(bpm.flush_page(page_id).unwrap());

        // A fresh pool over the same file sees the flushed bytes.
        drop(bpm);
        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, 2, dm);
        let guard = bpm2.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.data()[0], 0xAB);
    }

    #[test]
    fn test_flush_unknown_page() {
        let (bpm, _temp) = create_bpm(10);
        assert!(!bpm.flush_page(PageId::new(42)).unwrap());
    }
}
