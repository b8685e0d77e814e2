//! # Page allocator
//!
//! Hands out runs of fixed-size pages from the pool `[pheap_begin, pheap_end)`.
//! Usage is tracked in a byte-per-page bitmap (0 = free, 1 = used) that lives
//! inside a [`BlockAllocator`] allocation. Because of that, the page allocator
//! can only be built once the block allocator exists, and every operation
//! borrows it.
//!
//! Pages are released **one at a time**: no run length is recorded, so a
//! caller that allocated `n` pages frees each of the `n` page addresses.

use crate::{AllocError, BlockAllocator, FreeError, HeapLayout, InitError, PhysAddr};
use log::{debug, warn};

/// Bitmap-tracked allocator over the page pool.
#[derive(Debug)]
pub struct PageAllocator {
    /// Payload address of the bitmap block in the general heap.
    bitmap: PhysAddr,
    pool: PhysAddr,
    pages: usize,
    page_size: usize,
    used: usize,
}

const PAGE_FREE: u8 = 0;
const PAGE_USED: u8 = 1;

impl PageAllocator {
    /// Bootstrap the page bitmap through `heap`.
    ///
    /// The bitmap block is owned by the page allocator for the kernel's
    /// lifetime and must never be passed to [`BlockAllocator::free`].
    ///
    /// # Errors
    /// [`InitError::Bitmap`] if the heap cannot hold the bitmap.
    pub fn new(heap: &mut BlockAllocator<'_>) -> Result<Self, InitError> {
        let pages = heap.config().max_pages;
        let page_size = heap.config().page_size;
        let pool = heap.layout().pheap_begin();
        let bitmap = heap.allocate(pages).map_err(InitError::Bitmap)?;
        debug!("Page bitmap for {pages} pages at {bitmap}, pool at {pool}");
        Ok(Self {
            bitmap,
            pool,
            pages,
            page_size,
            used: 0,
        })
    }

    /// Address of the bitmap block inside the general heap.
    #[must_use]
    pub const fn bitmap(&self) -> PhysAddr {
        self.bitmap
    }

    /// Number of pages in the pool.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.pages
    }

    #[must_use]
    pub const fn used_pages(&self) -> usize {
        self.used
    }

    /// Whether page `index` is in use, or `None` if it is outside the pool.
    #[must_use]
    pub fn is_used(&self, heap: &BlockAllocator<'_>, index: usize) -> Option<bool> {
        if index >= self.pages {
            return None;
        }
        heap.window()
            .read_u8(self.bitmap + index)
            .map(|entry| entry != PAGE_FREE)
    }

    const fn page_addr(&self, index: usize) -> PhysAddr {
        PhysAddr::new(self.pool.as_usize() + index * self.page_size)
    }

    /// Allocate `count` contiguous zeroed pages and return the first page's address.
    ///
    /// # Errors
    /// * [`AllocError::InvalidArgument`] for `count == 0`.
    /// * [`AllocError::OutOfMemory`] if no free run of `count` pages exists.
    ///   The bitmap is left unchanged.
    pub fn allocate(
        &mut self,
        heap: &mut BlockAllocator<'_>,
        count: usize,
    ) -> Result<PhysAddr, AllocError> {
        if count == 0 {
            return Err(AllocError::InvalidArgument);
        }
        let requested = count.saturating_mul(self.page_size);

        let start = heap
            .window()
            .bytes(self.bitmap, self.pages)
            .and_then(|map| map.windows(count).position(|run| run.iter().all(|&e| e == PAGE_FREE)));
        let Some(start) = start else {
            warn!("Cannot allocate {count} pages: no contiguous run available");
            return Err(AllocError::OutOfMemory { requested });
        };

        let window = heap.window_mut();
        if let Some(entries) = window.bytes_mut(self.bitmap + start, count) {
            entries.fill(PAGE_USED);
        }
        let base = self.page_addr(start);
        window.zero(base, requested);
        self.used += count;

        debug!(
            "Pages {start}..{} allocated from {base} to {}",
            start + count,
            base + requested
        );
        Ok(base)
    }

    /// Release the single page at `ptr`.
    ///
    /// # Errors
    /// * [`FreeError::NullPointer`] for a null address.
    /// * [`FreeError::PageIndexOutOfRange`] if `ptr` lies outside the pool.
    /// * [`FreeError::UnalignedPage`] if `ptr` is not a page boundary.
    /// * [`FreeError::DoubleFree`] if the page is already free.
    /// * [`FreeError::CorruptedBlock`] if the bitmap marks the page used but
    ///   the allocator has no pages outstanding.
    ///
    /// Each error is logged and leaves the bitmap untouched.
    pub fn free(&mut self, heap: &mut BlockAllocator<'_>, ptr: PhysAddr) -> Result<(), FreeError> {
        let index = self
            .index_of(heap.layout(), ptr)
            .inspect_err(|e| warn!("Rejected page free: {e}"))?;

        let window = heap.window_mut();
        let entry = self.bitmap + index;
        if window.read_u8(entry) != Some(PAGE_USED) {
            let err = FreeError::DoubleFree(ptr);
            warn!("Rejected page free: {err}");
            return Err(err);
        }
        let Some(used) = self.used.checked_sub(1) else {
            let err = FreeError::CorruptedBlock(ptr);
            warn!("Rejected page free: bitmap entry {index} set with no pages in use");
            return Err(err);
        };

        window.write_u8(entry, PAGE_FREE);
        window.zero(ptr, self.page_size);
        self.used = used;
        debug!("Page {index} at {ptr} freed");
        Ok(())
    }

    fn index_of(&self, layout: &HeapLayout, ptr: PhysAddr) -> Result<usize, FreeError> {
        if ptr.is_null() {
            return Err(FreeError::NullPointer);
        }
        let offset = ptr
            .offset_from(self.pool)
            .filter(|_| layout.contains_pool(ptr))
            .ok_or(FreeError::PageIndexOutOfRange(ptr))?;
        if !offset.is_multiple_of(self.page_size) {
            return Err(FreeError::UnalignedPage(ptr));
        }
        Ok(offset / self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeapConfig, PhysWindow};

    const KERNEL_END: usize = 0x0010_0000;

    fn config() -> HeapConfig {
        HeapConfig::default()
            .with_pool_top(KERNEL_END + 0x1_0000 + 8 * 4096)
            .with_max_pages(8)
    }

    fn with_pages<R>(f: impl FnOnce(&mut BlockAllocator<'_>, &mut PageAllocator) -> R) -> R {
        let cfg = config();
        let layout = HeapLayout::compute(PhysAddr::new(KERNEL_END), &cfg).unwrap();
        let mut mem = vec![0x5Au8; layout.span()];
        let window = PhysWindow::from_slice(layout.heap_begin(), &mut mem);
        let mut heap = BlockAllocator::new(PhysAddr::new(KERNEL_END), window, cfg).unwrap();
        let mut pages = PageAllocator::new(&mut heap).unwrap();
        f(&mut heap, &mut pages)
    }

    #[test]
    fn bitmap_is_the_first_heap_block() {
        with_pages(|heap, pages| {
            let block = heap.blocks().next().unwrap();
            assert_eq!(block.payload, pages.bitmap());
            assert_eq!(block.size, 8);
            assert!(!block.is_free());
            assert!((0..8).all(|i| pages.is_used(heap, i) == Some(false)));
            assert_eq!(pages.is_used(heap, 8), None);
        });
    }

    #[test]
    fn allocated_pages_are_zeroed() {
        with_pages(|heap, pages| {
            let base = pages.allocate(heap, 2).unwrap();
            assert_eq!(base, heap.layout().pheap_begin());
            let bytes = heap.window().bytes(base, 2 * 4096).unwrap();
            assert!(bytes.iter().all(|&b| b == 0));
            assert_eq!(pages.used_pages(), 2);
        });
    }

    #[test]
    fn first_fit_run_skips_holes_that_are_too_small() {
        with_pages(|heap, pages| {
            let pool = heap.layout().pheap_begin();
            let a = pages.allocate(heap, 1).unwrap();
            let b = pages.allocate(heap, 1).unwrap();
            let _c = pages.allocate(heap, 1).unwrap();
            pages.free(heap, b).unwrap();
            assert_eq!(a, pool);

            // The one-page hole at index 1 cannot hold two pages.
            assert_eq!(pages.allocate(heap, 2).unwrap(), pool + 3 * 4096);
            assert_eq!(pages.allocate(heap, 1).unwrap(), b);
        });
    }

    #[test]
    fn multi_page_runs_are_freed_page_by_page() {
        with_pages(|heap, pages| {
            let base = pages.allocate(heap, 3).unwrap();
            pages.free(heap, base).unwrap();
            assert_eq!(pages.is_used(heap, 0), Some(false));
            assert_eq!(pages.is_used(heap, 1), Some(true));
            assert_eq!(pages.used_pages(), 2);

            pages.free(heap, base + 4096).unwrap();
            pages.free(heap, base + 2 * 4096).unwrap();
            assert_eq!(pages.used_pages(), 0);
        });
    }

    #[test]
    fn free_rejects_bad_addresses() {
        with_pages(|heap, pages| {
            let base = pages.allocate(heap, 1).unwrap();
            let end = heap.layout().pheap_end();

            assert_eq!(pages.free(heap, PhysAddr::NULL), Err(FreeError::NullPointer));
            assert_eq!(pages.free(heap, end), Err(FreeError::PageIndexOutOfRange(end)));
            let below = base - 1;
            assert_eq!(pages.free(heap, below), Err(FreeError::PageIndexOutOfRange(below)));
            assert_eq!(pages.free(heap, base + 8), Err(FreeError::UnalignedPage(base + 8)));
            let idle = base + 4096;
            assert_eq!(pages.free(heap, idle), Err(FreeError::DoubleFree(idle)));

            assert_eq!(pages.used_pages(), 1);
            pages.free(heap, base).unwrap();
            assert_eq!(pages.free(heap, base), Err(FreeError::DoubleFree(base)));
        });
    }

    #[test]
    fn zero_and_oversized_counts_fail() {
        with_pages(|heap, pages| {
            assert_eq!(pages.allocate(heap, 0), Err(AllocError::InvalidArgument));
            assert_eq!(
                pages.allocate(heap, 9),
                Err(AllocError::OutOfMemory { requested: 9 * 4096 })
            );
            assert_eq!(pages.allocate(heap, 8).unwrap(), heap.layout().pheap_begin());
            assert!(pages.allocate(heap, 1).is_err());
        });
    }

    #[test]
    fn stray_bitmap_entry_does_not_underflow_usage() {
        with_pages(|heap, pages| {
            let bitmap = pages.bitmap();
            heap.payload_mut(bitmap).unwrap()[5] = PAGE_USED;
            let page = heap.layout().pheap_begin() + 5 * 4096;

            assert_eq!(pages.free(heap, page), Err(FreeError::CorruptedBlock(page)));
            assert_eq!(pages.used_pages(), 0);
            assert_eq!(pages.is_used(heap, 5), Some(true));
        });
    }

    #[test]
    fn page_free_zeroes_only_that_page() {
        with_pages(|heap, pages| {
            let base = pages.allocate(heap, 2).unwrap();
            heap.window_mut().bytes_mut(base, 2 * 4096).unwrap().fill(0xEE);
            pages.free(heap, base).unwrap();
            let w = heap.window();
            assert!(w.bytes(base, 4096).unwrap().iter().all(|&b| b == 0));
            assert!(w.bytes(base + 4096, 4096).unwrap().iter().all(|&b| b == 0xEE));
        });
    }
}
