//! # First-fit block allocator
//!
//! Byte-granularity allocator over the general heap `[heap_begin, heap_end)`.
//!
//! ## Design outline
//! - **Headers in place**: every block starts with a [`BlockHeader`] followed by
//!   `size` payload bytes and `block_padding` trailing bytes. Blocks are laid
//!   out back to back from `heap_begin` up to the bump frontier `last_alloc`,
//!   so the heap can be walked header by header.
//! - **Allocation strategy**: first-fit. The walk takes the first Free block
//!   that is large enough. If the leftover would exceed `split_threshold`, the
//!   block is split and the tail becomes a new Free block. Otherwise the whole
//!   block is handed out. When nothing fits, the frontier is bumped.
//! - **Deallocation**: the header is found by subtracting the header size from
//!   the payload address and validated before anything is written. Bad
//!   pointers and double frees are logged and ignored.
//! - **Coalescing**: every `defrag_interval`-th free runs [`defragment`], a
//!   single pass that merges runs of adjacent Free blocks. Only headers change;
//!   payload bytes never move.
//!
//! ## Caveats
//! - First-fit trades some fragmentation for a trivial walk; the heap is small.
//! - The frontier never moves back, even when the last block is freed.
//! - Not reentrant. [`KernelMemory`](crate::KernelMemory) serializes access.
//!
//! [`defragment`]: BlockAllocator::defragment

use crate::header::{BLOCK_HEADER_SIZE, BlockHeader, BlockStatus};
use crate::{AllocError, FreeError, HeapConfig, HeapLayout, HeapStats, InitError, PhysAddr, PhysWindow};
use log::{info, trace, warn};

/// A block as seen by a heap walk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the header.
    pub header: PhysAddr,
    /// Address of the first payload byte, as returned by `allocate`.
    pub payload: PhysAddr,
    /// Payload size in bytes.
    pub size: usize,
    pub status: BlockStatus,
}

impl BlockInfo {
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.status, BlockStatus::Free)
    }
}

/// First-fit allocator owning the heap and page-pool window.
pub struct BlockAllocator<'a> {
    window: PhysWindow<'a>,
    layout: HeapLayout,
    config: HeapConfig,
    /// Bump frontier; every block lies below it.
    last_alloc: PhysAddr,
    stats: HeapStats,
}

impl<'a> BlockAllocator<'a> {
    /// Take ownership of `window` and set up an empty heap after `kernel_end`.
    ///
    /// The window must cover exactly `[heap_begin, pheap_end)` of the layout
    /// [`HeapLayout::compute`] derives from `kernel_end` and `config`. The heap
    /// part is zeroed; the page pool is left to the page allocator.
    ///
    /// # Errors
    /// Any [`InitError`]; all of them are fatal at boot.
    pub fn new(
        kernel_end: PhysAddr,
        mut window: PhysWindow<'a>,
        config: HeapConfig,
    ) -> Result<Self, InitError> {
        let layout = HeapLayout::compute(kernel_end, &config)?;
        if window.base() != layout.heap_begin() || window.len() != layout.span() {
            return Err(InitError::WindowMismatch {
                base: window.base(),
                len: window.len(),
                begin: layout.heap_begin(),
                end: layout.pheap_end(),
            });
        }

        window.zero(layout.heap_begin(), layout.heap_capacity());
        info!(
            "Kernel heap starts at {} ({} bytes, page pool at {})",
            layout.heap_begin(),
            layout.heap_capacity(),
            layout.pheap_begin()
        );

        Ok(Self {
            window,
            layout,
            config,
            last_alloc: layout.heap_begin(),
            stats: HeapStats::default(),
        })
    }

    #[must_use]
    pub const fn layout(&self) -> &HeapLayout {
        &self.layout
    }

    #[must_use]
    pub const fn config(&self) -> &HeapConfig {
        &self.config
    }

    #[must_use]
    pub const fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Current bump frontier (`last_alloc`).
    #[must_use]
    pub const fn frontier(&self) -> PhysAddr {
        self.last_alloc
    }

    pub(crate) const fn window(&self) -> &PhysWindow<'a> {
        &self.window
    }

    pub(crate) const fn window_mut(&mut self) -> &mut PhysWindow<'a> {
        &mut self.window
    }

    /// Full footprint of a block with `size` payload bytes.
    const fn stride(&self, size: usize) -> usize {
        BLOCK_HEADER_SIZE + size + self.config.block_padding
    }

    /// Decode the header at `at` if it is valid and its block ends below the frontier.
    fn header_at(&self, at: PhysAddr) -> Option<BlockHeader> {
        if at < self.layout.heap_begin() {
            return None;
        }
        let header = BlockHeader::read(&self.window, at)?;
        let end = at.checked_add(self.stride(header.len()))?;
        (end <= self.last_alloc).then_some(header)
    }

    /// Walk all blocks from `heap_begin` to the frontier.
    ///
    /// The walk stops early at the first invalid header.
    #[must_use]
    pub fn blocks(&self) -> Blocks<'_, 'a> {
        Blocks {
            heap: self,
            cursor: self.layout.heap_begin(),
        }
    }

    /// Allocate `size` zeroed bytes and return the payload address.
    ///
    /// # Errors
    /// * [`AllocError::InvalidArgument`] for `size == 0`.
    /// * [`AllocError::OutOfMemory`] if neither a free block nor the frontier fits.
    pub fn allocate(&mut self, size: usize) -> Result<PhysAddr, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidArgument);
        }
        let Ok(size32) = u32::try_from(size) else {
            warn!("Cannot allocate {size} bytes: request exceeds block size field");
            return Err(AllocError::OutOfMemory { requested: size });
        };

        match self.find_free(size) {
            Some(block) => Ok(self.claim(block, size)),
            None => self.bump(size32),
        }
    }

    /// First Free block with at least `size` payload bytes.
    fn find_free(&self, size: usize) -> Option<BlockInfo> {
        let mut walk = self.blocks();
        let found = walk.by_ref().find(|b| b.is_free() && b.size >= size);
        if found.is_none() && walk.cursor < self.last_alloc {
            warn!("Heap walk stopped at corrupted header {}", walk.cursor);
        }
        found
    }

    /// Mark `block` Allocated for a request of `requested` bytes, splitting off the tail if large enough.
    fn claim(&mut self, block: BlockInfo, requested: usize) -> PhysAddr {
        let overhead = BLOCK_HEADER_SIZE + self.config.block_padding;
        let leftover = (block.size - requested).checked_sub(overhead);

        let size = match leftover {
            Some(rest) if rest > self.config.split_threshold => {
                let tail = block.payload + requested + self.config.block_padding;
                // Both sizes are below the claimed block's u32 size.
                #[allow(clippy::cast_possible_truncation)]
                BlockHeader::new(BlockStatus::Free, rest as u32).write(&mut self.window, tail);
                trace!(
                    "Split block {}: {} bytes kept, {} bytes free at {}",
                    block.header, requested, rest, tail
                );
                requested
            }
            _ => block.size,
        };

        #[allow(clippy::cast_possible_truncation)]
        BlockHeader::new(BlockStatus::Allocated, size as u32).write(&mut self.window, block.header);
        self.window.zero(block.payload, size);
        let footprint = self.stride(size);
        self.stats.record_alloc(footprint);
        block.payload
    }

    /// Carve a new block at the frontier.
    fn bump(&mut self, size: u32) -> Result<PhysAddr, AllocError> {
        let requested = size as usize;
        let stride = self.stride(requested);
        let end = match self.last_alloc.checked_add(stride) {
            Some(end) if end < self.layout.heap_end() => end,
            _ => {
                warn!("Cannot allocate {requested} bytes: out of memory");
                return Err(AllocError::OutOfMemory { requested });
            }
        };

        let header = self.last_alloc;
        let payload = header + BLOCK_HEADER_SIZE;
        BlockHeader::new(BlockStatus::Allocated, size).write(&mut self.window, header);
        self.window.zero(payload, requested);
        self.last_alloc = end;
        self.stats.record_alloc(stride);
        Ok(payload)
    }

    /// Locate and validate the header of the block whose payload starts at `ptr`.
    fn lookup(&self, ptr: PhysAddr) -> Result<BlockInfo, FreeError> {
        if ptr.is_null() {
            return Err(FreeError::NullPointer);
        }
        let header = ptr
            .checked_sub(BLOCK_HEADER_SIZE)
            .filter(|at| self.layout.contains_heap(*at))
            .ok_or(FreeError::CorruptedBlock(ptr))?;
        let decoded = self.header_at(header).ok_or(FreeError::CorruptedBlock(ptr))?;
        Ok(BlockInfo {
            header,
            payload: ptr,
            size: decoded.len(),
            status: decoded.status,
        })
    }

    /// Release the block whose payload starts at `ptr`.
    ///
    /// The payload is zeroed. Every `defrag_interval`-th successful free also
    /// runs [`defragment`](Self::defragment).
    ///
    /// # Errors
    /// [`FreeError::NullPointer`], [`FreeError::CorruptedBlock`] or
    /// [`FreeError::DoubleFree`]. Each is logged and leaves the heap untouched.
    pub fn free(&mut self, ptr: PhysAddr) -> Result<(), FreeError> {
        let block = self.lookup(ptr).inspect_err(|e| warn!("Rejected block free: {e}"))?;
        if block.is_free() {
            let err = FreeError::DoubleFree(ptr);
            warn!("Rejected block free: {err}");
            return Err(err);
        }

        #[allow(clippy::cast_possible_truncation)]
        BlockHeader::new(BlockStatus::Free, block.size as u32).write(&mut self.window, block.header);
        self.window.zero(block.payload, block.size);
        let footprint = self.stride(block.size);
        self.stats.record_free(footprint);

        let interval = self.config.defrag_interval;
        if interval != 0 && self.stats.total_frees.is_multiple_of(interval) {
            let merged = self.defragment();
            trace!("Periodic defragmentation merged {merged} blocks");
        }
        Ok(())
    }

    /// Merge every run of adjacent Free blocks into its first block.
    ///
    /// Absorbed headers are wiped so they never validate again. Returns the
    /// number of merges performed.
    pub fn defragment(&mut self) -> usize {
        let mut merged = 0;
        let mut at = self.layout.heap_begin();

        while at < self.last_alloc {
            let Some(mut current) = self.header_at(at) else {
                warn!("Defragmentation stopped at corrupted header {at}");
                break;
            };

            while current.is_free() {
                let next_at = at + self.stride(current.len());
                let Some(next) = self.header_at(next_at).filter(BlockHeader::is_free) else {
                    break;
                };
                let Ok(grown) = u32::try_from(current.len() + self.stride(next.len())) else {
                    break;
                };
                BlockHeader::invalidate(&mut self.window, next_at);
                current.size = grown;
                current.write(&mut self.window, at);
                merged += 1;
                trace!("Merged free block {next_at} into {at} ({grown} bytes)");
            }

            at = at + self.stride(current.len());
        }
        merged
    }

    /// Borrow the payload of the Allocated block at `ptr`.
    #[must_use]
    pub fn payload(&self, ptr: PhysAddr) -> Option<&[u8]> {
        let block = self.lookup(ptr).ok().filter(|b| !b.is_free())?;
        self.window.bytes(block.payload, block.size)
    }

    /// Mutably borrow the payload of the Allocated block at `ptr`.
    #[must_use]
    pub fn payload_mut(&mut self, ptr: PhysAddr) -> Option<&mut [u8]> {
        let block = self.lookup(ptr).ok().filter(|b| !b.is_free())?;
        self.window.bytes_mut(block.payload, block.size)
    }

    /// Inspect the block whose payload starts at `ptr`, Free or Allocated.
    #[must_use]
    pub fn block(&self, ptr: PhysAddr) -> Option<BlockInfo> {
        self.lookup(ptr).ok()
    }
}

/// Iterator returned by [`BlockAllocator::blocks`].
pub struct Blocks<'h, 'a> {
    heap: &'h BlockAllocator<'a>,
    cursor: PhysAddr,
}

impl Iterator for Blocks<'_, '_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        if self.cursor >= self.heap.last_alloc {
            return None;
        }
        let header = self.heap.header_at(self.cursor)?;
        let info = BlockInfo {
            header: self.cursor,
            payload: self.cursor + BLOCK_HEADER_SIZE,
            size: header.len(),
            status: header.status,
        };
        self.cursor = self.cursor + self.heap.stride(header.len());
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNEL_END: usize = 0x0010_0000;

    /// 64 KiB heap followed by a 4-page pool.
    fn config() -> HeapConfig {
        HeapConfig::default()
            .with_pool_top(KERNEL_END + 0x1_4000)
            .with_max_pages(4)
    }

    fn with_heap<R>(config: HeapConfig, f: impl FnOnce(&mut BlockAllocator<'_>) -> R) -> R {
        let layout = HeapLayout::compute(PhysAddr::new(KERNEL_END), &config).unwrap();
        let mut mem = vec![0xCCu8; layout.span()];
        let window = PhysWindow::from_slice(layout.heap_begin(), &mut mem);
        let mut heap = BlockAllocator::new(PhysAddr::new(KERNEL_END), window, config).unwrap();
        f(&mut heap)
    }

    #[test]
    fn init_zeroes_heap_and_leaves_frontier_at_start() {
        with_heap(config(), |heap| {
            let layout = *heap.layout();
            assert_eq!(heap.frontier(), layout.heap_begin());
            assert_eq!(layout.heap_capacity(), 0x1_0000);
            let bytes = heap.window().bytes(layout.heap_begin(), layout.heap_capacity()).unwrap();
            assert!(bytes.iter().all(|&b| b == 0));
            assert_eq!(heap.blocks().count(), 0);
        });
    }

    #[test]
    fn window_must_match_layout() {
        let cfg = config();
        let layout = HeapLayout::compute(PhysAddr::new(KERNEL_END), &cfg).unwrap();
        let mut mem = vec![0u8; layout.span() - 1];
        let window = PhysWindow::from_slice(layout.heap_begin(), &mut mem);
        let err = BlockAllocator::new(PhysAddr::new(KERNEL_END), window, cfg).err();
        assert!(matches!(err, Some(InitError::WindowMismatch { .. })));
    }

    #[test]
    fn bump_allocations_are_contiguous() {
        with_heap(config(), |heap| {
            let begin = heap.layout().heap_begin();
            let a = heap.allocate(10).unwrap();
            let b = heap.allocate(20).unwrap();
            assert_eq!(a, begin + BLOCK_HEADER_SIZE);
            assert_eq!(b, a + 10 + 4 + BLOCK_HEADER_SIZE);
            assert_eq!(heap.frontier(), b + 20 + 4);
            assert_eq!(heap.stats().memory_used, (12 + 10 + 4) + (12 + 20 + 4));
            assert_eq!(heap.stats().total_allocations, 2);
        });
    }

    #[test]
    fn small_remainder_is_not_split() {
        with_heap(config(), |heap| {
            let a = heap.allocate(100).unwrap();
            let _guard = heap.allocate(8).unwrap();
            heap.free(a).unwrap();

            // 100 - 40 - 16 = 44 <= 64, so the whole block is reused.
            let b = heap.allocate(40).unwrap();
            assert_eq!(a, b);
            assert_eq!(heap.block(b).unwrap().size, 100);
            assert_eq!(heap.payload(b).unwrap().len(), 100);
            assert_eq!(heap.stats().memory_used, (12 + 100 + 4) + (12 + 8 + 4));
        });
    }

    #[test]
    fn remainder_exactly_at_threshold_is_not_split() {
        with_heap(config(), |heap| {
            let a = heap.allocate(100).unwrap();
            heap.allocate(8).unwrap();
            heap.free(a).unwrap();

            // 100 - 20 - 16 = 64: not strictly greater than the threshold.
            heap.allocate(20).unwrap();
            assert_eq!(heap.block(a).unwrap().size, 100);
        });
    }

    #[test]
    fn reuse_zeroes_stale_payload() {
        with_heap(config(), |heap| {
            let a = heap.allocate(32).unwrap();
            heap.payload_mut(a).unwrap().fill(0xAB);
            heap.allocate(4).unwrap();
            heap.free(a).unwrap();
            assert!(heap.window().bytes(a, 32).unwrap().iter().all(|&b| b == 0));

            let b = heap.allocate(32).unwrap();
            assert_eq!(a, b);
            assert!(heap.payload(b).unwrap().iter().all(|&b| b == 0));
        });
    }

    #[test]
    fn free_rejects_pointers_that_are_not_blocks() {
        with_heap(config(), |heap| {
            let a = heap.allocate(64).unwrap();
            let before = heap.stats();

            assert_eq!(heap.free(PhysAddr::NULL), Err(FreeError::NullPointer));
            assert_eq!(heap.free(a + 1), Err(FreeError::CorruptedBlock(a + 1)));
            let past = heap.frontier() + BLOCK_HEADER_SIZE;
            assert_eq!(heap.free(past), Err(FreeError::CorruptedBlock(past)));
            let pool = heap.layout().pheap_begin() + BLOCK_HEADER_SIZE;
            assert_eq!(heap.free(pool), Err(FreeError::CorruptedBlock(pool)));
            let low = PhysAddr::new(0x10);
            assert_eq!(heap.free(low), Err(FreeError::CorruptedBlock(low)));

            assert_eq!(heap.stats(), before);
            assert_eq!(heap.block(a).unwrap().status, BlockStatus::Allocated);
        });
    }

    #[test]
    fn defragment_merges_runs_and_skips_allocated() {
        with_heap(config().with_defrag_interval(0), |heap| {
            let a = heap.allocate(16).unwrap();
            let b = heap.allocate(16).unwrap();
            let c = heap.allocate(16).unwrap();
            let d = heap.allocate(16).unwrap();
            let e = heap.allocate(16).unwrap();
            for p in [a, b, c, e] {
                heap.free(p).unwrap();
            }

            assert_eq!(heap.defragment(), 2);
            let blocks: Vec<_> = heap.blocks().collect();
            assert_eq!(blocks.len(), 3);
            assert_eq!(blocks[0].payload, a);
            assert_eq!(blocks[0].size, 16 * 3 + 2 * (12 + 4));
            assert!(blocks[0].is_free());
            assert_eq!(blocks[1].payload, d);
            assert_eq!(blocks[2].payload, e);

            // Absorbed headers no longer validate.
            assert_eq!(heap.free(b), Err(FreeError::CorruptedBlock(b)));
            assert_eq!(heap.defragment(), 0);
        });
    }

    #[test]
    fn tenth_free_triggers_defragmentation() {
        with_heap(config(), |heap| {
            let ptrs: Vec<_> = (0..10).map(|_| heap.allocate(8).unwrap()).collect();
            for p in &ptrs[..9] {
                heap.free(*p).unwrap();
            }
            assert_eq!(heap.blocks().count(), 10);

            heap.free(ptrs[9]).unwrap();
            let blocks: Vec<_> = heap.blocks().collect();
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].size, 10 * 8 + 9 * (12 + 4));
        });
    }

    #[test]
    fn oversized_request_fails_without_side_effects() {
        with_heap(config(), |heap| {
            let before = (heap.stats(), heap.frontier());
            let cap = heap.layout().heap_capacity();
            assert_eq!(
                heap.allocate(cap),
                Err(AllocError::OutOfMemory { requested: cap })
            );
            assert_eq!(
                heap.allocate(usize::MAX),
                Err(AllocError::OutOfMemory { requested: usize::MAX })
            );
            assert_eq!((heap.stats(), heap.frontier()), before);
        });
    }

    #[test]
    fn frontier_must_stay_below_heap_end() {
        with_heap(config(), |heap| {
            let cap = heap.layout().heap_capacity();
            // Exactly reaching heap_end is rejected.
            assert!(heap.allocate(cap - 16).is_err());
            let p = heap.allocate(cap - 17).unwrap();
            assert_eq!(heap.frontier(), heap.layout().heap_end() - 1);
            assert_eq!(heap.payload(p).unwrap().len(), cap - 17);
        });
    }

    #[test]
    fn walk_stops_at_corrupted_header() {
        with_heap(config(), |heap| {
            let a = heap.allocate(8).unwrap();
            let b = heap.allocate(8).unwrap();
            heap.allocate(8).unwrap();
            heap.window_mut().write_u32(b - BLOCK_HEADER_SIZE, 0xBAD0_BAD0);

            assert_eq!(heap.blocks().map(|blk| blk.payload).collect::<Vec<_>>(), vec![a]);
            // Allocation still succeeds from the frontier.
            let frontier = heap.frontier();
            assert_eq!(heap.allocate(8).unwrap(), frontier + BLOCK_HEADER_SIZE);
        });
    }
}
