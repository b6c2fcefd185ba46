use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolCore;
use super::FrameHeader;

/// RAII handle for a pinned page. Holding the guard keeps the page in its
/// frame; dropping it releases exactly one pin and propagates the dirty
/// flag back to the pool.
///
/// A basic guard holds no page latch. Each data access takes the frame's
/// latch for just that access; use [`upgrade_read`](Self::upgrade_read) or
/// [`upgrade_write`](Self::upgrade_write) to hold it across accesses.
pub struct BasicPageGuard {
    pub(crate) core: Arc<PoolCore>,
    pub(crate) frame: Arc<FrameHeader>,
    pub(crate) page_id: PageId,
    pub(crate) is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(core: Arc<PoolCore>, frame: Arc<FrameHeader>, page_id: PageId) -> Self {
        Self {
            core,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Shared view of the page bytes, latched for the borrow's duration.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.data.read()
    }

    /// Mutable view of the page bytes; marks the guard dirty.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.is_dirty = true;
        self.frame.data.write()
    }

    /// Converts this guard into one holding the page's shared latch.
    /// The pin carries over.
    pub fn upgrade_read(self) -> ReadPageGuard {
        ReadPageGuard::new(self)
    }

    /// Converts this guard into one holding the page's exclusive latch.
    /// The pin carries over.
    pub fn upgrade_write(self) -> WritePageGuard {
        WritePageGuard::new(self)
    }

    /// Drops this guard, releasing the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.core.unpin_page(self.page_id, self.is_dirty);
    }
}

/// RAII guard for shared access to a page. Holds the page's read latch for
/// its whole lifetime and unpins on drop, after releasing the latch.
pub struct ReadPageGuard {
    // Declared before `guard` so the latch is released before the unpin.
    data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
    guard: BasicPageGuard,
}

impl ReadPageGuard {
    pub(crate) fn new(guard: BasicPageGuard) -> Self {
        let data_guard = guard.frame.data.read();
        // Safety: the borrow is tied to the frame, which stays alive through
        // the Arc held in `guard` for at least as long as this lock guard.
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { mem::transmute(data_guard) };

        Self { data_guard, guard }
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard[..]
    }

    /// Drops this guard, releasing the latch and the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// RAII guard for exclusive access to a page. Holds the page's write latch
/// for its whole lifetime; mutable access marks the page dirty, which the
/// pool learns about when the guard drops.
pub struct WritePageGuard {
    // Declared before `guard` so the latch is released before the unpin.
    data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>,
    guard: BasicPageGuard,
}

impl WritePageGuard {
    pub(crate) fn new(guard: BasicPageGuard) -> Self {
        let data_guard = guard.frame.data.write();
        // Safety: the borrow is tied to the frame, which stays alive through
        // the Arc held in `guard` for at least as long as this lock guard.
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { mem::transmute(data_guard) };

        Self { data_guard, guard }
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard[..]
    }

    /// Mutable view of the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.is_dirty = true;
        &mut self.data_guard[..]
    }

    /// Drops this guard, releasing the latch and the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}
