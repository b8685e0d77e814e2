//! Region bounds for the general heap and the page pool.

use crate::{HeapConfig, InitError, PhysAddr};
use kernel_info::memory::HEAP_ALIGN;

/// Fixed boundaries of both managed regions.
///
/// ```text
/// heap_begin            heap_end == pheap_begin          pheap_end
///     │   block heap            │        page pool            │
///     └─────────────────────────┴─────────────────────────────┘
/// ```
///
/// The layout is a pure function of `kernel_end` and the configuration, so
/// computing it twice yields identical boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeapLayout {
    heap_begin: PhysAddr,
    heap_end: PhysAddr,
    pheap_begin: PhysAddr,
    pheap_end: PhysAddr,
}

impl HeapLayout {
    /// Derive both regions from the first byte after the kernel image.
    ///
    /// # Errors
    /// * [`InitError::NullKernelEnd`] if `kernel_end` is zero.
    /// * [`InitError::InvalidConfig`] if `config` fails validation.
    /// * [`InitError::EmptyHeap`] if the kernel reaches into the page pool.
    pub fn compute(kernel_end: PhysAddr, config: &HeapConfig) -> Result<Self, InitError> {
        if kernel_end.is_null() {
            return Err(InitError::NullKernelEnd);
        }
        config.validate()?;

        let pool_size = config
            .pool_size()
            .ok_or(InitError::InvalidConfig("page pool size overflows"))?;
        let pheap_end = PhysAddr::new(config.pool_top);
        let pheap_begin = pheap_end - pool_size;
        let heap_end = pheap_begin;

        let heap_begin = kernel_end
            .align_up(HEAP_ALIGN)
            .ok_or(InitError::EmptyHeap {
                begin: kernel_end,
                end: heap_end,
            })?;
        if heap_begin >= heap_end {
            return Err(InitError::EmptyHeap {
                begin: heap_begin,
                end: heap_end,
            });
        }

        Ok(Self {
            heap_begin,
            heap_end,
            pheap_begin,
            pheap_end,
        })
    }

    #[must_use]
    pub const fn heap_begin(&self) -> PhysAddr {
        self.heap_begin
    }

    #[must_use]
    pub const fn heap_end(&self) -> PhysAddr {
        self.heap_end
    }

    #[must_use]
    pub const fn pheap_begin(&self) -> PhysAddr {
        self.pheap_begin
    }

    #[must_use]
    pub const fn pheap_end(&self) -> PhysAddr {
        self.pheap_end
    }

    /// Bytes available to the block allocator, headers included.
    #[must_use]
    pub const fn heap_capacity(&self) -> usize {
        self.heap_end.as_usize() - self.heap_begin.as_usize()
    }

    /// Bytes in the page pool.
    #[must_use]
    pub const fn page_capacity(&self) -> usize {
        self.pheap_end.as_usize() - self.pheap_begin.as_usize()
    }

    /// Length of the physical window `[heap_begin, pheap_end)` backing both regions.
    #[must_use]
    pub const fn span(&self) -> usize {
        self.pheap_end.as_usize() - self.heap_begin.as_usize()
    }

    #[must_use]
    pub fn contains_heap(&self, addr: PhysAddr) -> bool {
        (self.heap_begin..self.heap_end).contains(&addr)
    }

    #[must_use]
    pub fn contains_pool(&self, addr: PhysAddr) -> bool {
        (self.pheap_begin..self.pheap_end).contains(&addr)
    }
}
