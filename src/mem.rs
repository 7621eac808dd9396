/*!
 * Memory Interface Shape
 * Page-counted address spaces backed by a bounded pool
 *
 * The scheduler core does not design real memory management; it only needs
 * the interface shape of its collaborators: an address space that can be
 * cloned on fork (and can fail), destroyed on free, and report its size.
 */

use crate::core::errors::{KernelError, KernelResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// Size of one page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Fixed-capacity page pool shared by all address spaces and context pages.
pub struct MemoryPool {
    inner: Mutex<PoolState>,
}

struct PoolState {
    used: usize,
    capacity: usize,
}

impl MemoryPool {
    pub fn new(capacity_pages: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PoolState {
                used: 0,
                capacity: capacity_pages,
            }),
        })
    }

    /// Reserve `pages` pages, failing with `OutOfMemory` when exhausted.
    pub fn alloc(self: &Arc<Self>, pages: usize) -> KernelResult<PageBlock> {
        let mut state = self.inner.lock();
        if state.used + pages > state.capacity {
            return Err(KernelError::OutOfMemory);
        }
        state.used += pages;
        Ok(PageBlock {
            pool: Arc::clone(self),
            pages,
        })
    }

    /// Pages currently reserved.
    pub fn used_pages(&self) -> usize {
        self.inner.lock().used
    }

    fn release(&self, pages: usize) {
        let mut state = self.inner.lock();
        debug_assert!(state.used >= pages);
        state.used -= pages;
    }
}

/// An RAII reservation of pages; dropping it returns them to the pool.
pub struct PageBlock {
    pool: Arc<MemoryPool>,
    pages: usize,
}

impl PageBlock {
    pub fn pages(&self) -> usize {
        self.pages
    }

    fn grow_to(&mut self, pages: usize) -> KernelResult<()> {
        if pages > self.pages {
            let mut state = self.pool.inner.lock();
            let extra = pages - self.pages;
            if state.used + extra > state.capacity {
                return Err(KernelError::OutOfMemory);
            }
            state.used += extra;
            drop(state);
            self.pages = pages;
        }
        Ok(())
    }
}

impl Drop for PageBlock {
    fn drop(&mut self) {
        self.pool.release(self.pages);
    }
}

/// A process address space: a page count, nothing more.
pub struct AddressSpace {
    mem: PageBlock,
}

impl AddressSpace {
    /// An empty space with no user pages (the state `alloc()` leaves a new
    /// record in before fork copies the parent image into it).
    pub fn empty(pool: &Arc<MemoryPool>) -> Self {
        Self {
            mem: PageBlock {
                pool: Arc::clone(pool),
                pages: 0,
            },
        }
    }

    /// Map `pages` image pages into this space (the boot image).
    pub fn map_initial(&mut self, pages: usize) -> KernelResult<()> {
        self.mem.grow_to(pages)
    }

    /// Clone the other space's pages into this one (fork). Fails with
    /// `OutOfMemory` when the pool is exhausted; the caller rolls back.
    pub fn copy_from(&mut self, other: &AddressSpace) -> KernelResult<()> {
        self.mem.grow_to(other.mem.pages())
    }

    pub fn size_bytes(&self) -> usize {
        self.mem.pages() * PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_recoverable() {
        let pool = MemoryPool::new(4);
        let block = pool.alloc(3).unwrap();
        assert_eq!(pool.used_pages(), 3);
        assert!(matches!(pool.alloc(2), Err(KernelError::OutOfMemory)));
        drop(block);
        assert_eq!(pool.used_pages(), 0);
        assert!(pool.alloc(4).is_ok());
    }

    #[test]
    fn address_space_copy_reserves_pages() {
        let pool = MemoryPool::new(8);
        let mut parent = AddressSpace::empty(&pool);
        parent.map_initial(3).unwrap();

        let mut child = AddressSpace::empty(&pool);
        child.copy_from(&parent).unwrap();
        assert_eq!(child.size_bytes(), 3 * PAGE_SIZE);
        assert_eq!(pool.used_pages(), 6);

        let mut second = AddressSpace::empty(&pool);
        assert_eq!(
            second.copy_from(&parent).unwrap_err(),
            KernelError::OutOfMemory
        );
        drop(child);
        assert_eq!(pool.used_pages(), 3);
    }
}
