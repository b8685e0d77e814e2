//! The kernel's single owner of the heap and the page pool.

use crate::{
    BlockAllocator, BlockInfo, FreeError, HeapConfig, HeapLayout, InitError, MemoryStatus,
    PageAllocator, PhysAddr, PhysWindow,
};
use kernel_sync::SpinLock;
use log::{debug, info, warn};

struct Inner<'a> {
    heap: BlockAllocator<'a>,
    pages: PageAllocator,
}

/// Both allocators behind one interrupt-safe lock.
///
/// Constructed once at boot and handed to every subsystem by reference. Every
/// entry point masks interrupts and takes the lock for its whole duration, so
/// interrupt handlers may allocate without corrupting a walk in progress.
pub struct KernelMemory<'a> {
    inner: SpinLock<Inner<'a>>,
}

impl KernelMemory<'static> {
    /// Bring up the heap on the identity-mapped physical memory after `kernel_end`.
    ///
    /// # Errors
    /// Any [`InitError`]; the caller is expected to halt.
    ///
    /// # Safety
    /// `[align_up(kernel_end), config.pool_top)` must be valid RAM that nothing
    /// else uses for the rest of the kernel's lifetime.
    #[allow(unsafe_code)]
    pub unsafe fn init(kernel_end: PhysAddr, config: HeapConfig) -> Result<Self, InitError> {
        let layout = HeapLayout::compute(kernel_end, &config)?;
        let window = unsafe { PhysWindow::from_raw(layout.heap_begin(), layout.span()) };
        Self::new(kernel_end, window, config)
    }
}

impl<'a> KernelMemory<'a> {
    /// Build the block allocator over `window`, then bootstrap the page bitmap through it.
    ///
    /// # Errors
    /// Any [`InitError`]; all of them are fatal at boot.
    pub fn new(
        kernel_end: PhysAddr,
        window: PhysWindow<'a>,
        config: HeapConfig,
    ) -> Result<Self, InitError> {
        let mut heap = BlockAllocator::new(kernel_end, window, config)?;
        let pages = PageAllocator::new(&mut heap)?;
        Ok(Self {
            inner: SpinLock::new(Inner { heap, pages }),
        })
    }

    /// Allocate `size` zeroed bytes from the general heap.
    ///
    /// Returns `None` for zero-sized requests and when the heap is exhausted.
    pub fn allocate_block(&self, size: usize) -> Option<PhysAddr> {
        self.inner.with_lock_irq(|m| {
            m.heap
                .allocate(size)
                .inspect_err(|e| debug!("Block allocation of {size} bytes failed: {e}"))
                .ok()
        })
    }

    /// Release a block returned by [`allocate_block`](Self::allocate_block).
    ///
    /// # Errors
    /// See [`BlockAllocator::free`]; additionally [`FreeError::Reserved`] for
    /// the page bitmap. The heap is unchanged on error.
    pub fn free_block(&self, ptr: PhysAddr) -> Result<(), FreeError> {
        self.inner.with_lock_irq(|m| {
            if ptr == m.pages.bitmap() {
                let err = FreeError::Reserved(ptr);
                warn!("Rejected block free: {err}");
                return Err(err);
            }
            m.heap.free(ptr)
        })
    }

    /// Allocate `count` contiguous zeroed pages from the page pool.
    pub fn allocate_pages(&self, count: usize) -> Option<PhysAddr> {
        self.inner.with_lock_irq(|m| {
            let Inner { heap, pages } = m;
            pages
                .allocate(heap, count)
                .inspect_err(|e| debug!("Page allocation of {count} pages failed: {e}"))
                .ok()
        })
    }

    /// Release the single page at `ptr`.
    ///
    /// # Errors
    /// See [`PageAllocator::free`].
    pub fn free_pages(&self, ptr: PhysAddr) -> Result<(), FreeError> {
        self.inner.with_lock_irq(|m| {
            let Inner { heap, pages } = m;
            pages.free(heap, ptr)
        })
    }

    /// Run a coalescing pass now instead of waiting for the next periodic one.
    pub fn defragment(&self) -> usize {
        self.inner.with_lock_irq(|m| m.heap.defragment())
    }

    /// Snapshot of the diagnostics counters and region bounds.
    #[must_use]
    pub fn status(&self) -> MemoryStatus {
        self.inner.with_lock_irq(|m| {
            MemoryStatus::new(m.heap.stats(), m.heap.layout(), m.pages.used_pages())
        })
    }

    /// Emit the status report at `info` level.
    pub fn log_status(&self) {
        info!("{}", self.status());
    }

    /// Run `f` on the payload of the Allocated block at `ptr`.
    ///
    /// Returns `None` if `ptr` does not name a live block, or names the page bitmap.
    pub fn with_block<R>(&self, ptr: PhysAddr, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        self.inner.with_lock_irq(|m| {
            if ptr == m.pages.bitmap() {
                return None;
            }
            m.heap.payload_mut(ptr).map(f)
        })
    }

    /// Run `f` on the in-use page at `ptr`.
    ///
    /// Returns `None` unless `ptr` is the start of an allocated page.
    pub fn with_page<R>(&self, ptr: PhysAddr, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        self.inner.with_lock_irq(|m| {
            let layout = *m.heap.layout();
            let page_size = m.heap.config().page_size;
            let index = ptr.offset_from(layout.pheap_begin())? / page_size;
            if layout.pheap_begin() + index * page_size != ptr
                || m.pages.is_used(&m.heap, index) != Some(true)
            {
                return None;
            }
            m.heap.window_mut().bytes_mut(ptr, page_size).map(f)
        })
    }

    /// Visit every block from `heap_begin` to the frontier.
    pub fn walk(&self, mut f: impl FnMut(BlockInfo)) {
        self.inner.with_lock_irq(|m| m.heap.blocks().for_each(&mut f));
    }

    /// Region bounds; fixed after construction.
    #[must_use]
    pub fn layout(&self) -> HeapLayout {
        self.inner.with_lock_irq(|m| *m.heap.layout())
    }

    /// Current bump frontier of the general heap.
    #[must_use]
    pub fn frontier(&self) -> PhysAddr {
        self.inner.with_lock_irq(|m| m.heap.frontier())
    }

    /// Address of the page bitmap block; never freed.
    #[must_use]
    pub fn page_bitmap(&self) -> PhysAddr {
        self.inner.with_lock_irq(|m| m.pages.bitmap())
    }
}
