//! Diagnostics counters and the status snapshot.

use crate::{HeapLayout, PhysAddr};
use core::fmt;

/// Running counters maintained by the block allocator.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub total_allocations: usize,
    pub total_frees: usize,
    /// `Σ (size + header + padding)` over all Allocated blocks.
    pub memory_used: usize,
}

impl HeapStats {
    pub(crate) const fn record_alloc(&mut self, footprint: usize) {
        self.total_allocations += 1;
        self.memory_used += footprint;
    }

    pub(crate) const fn record_free(&mut self, footprint: usize) {
        self.total_frees += 1;
        self.memory_used = self.memory_used.saturating_sub(footprint);
    }
}

/// Read-only snapshot of both allocators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryStatus {
    pub total_allocations: usize,
    pub total_frees: usize,
    pub memory_used: usize,
    pub heap_capacity: usize,
    pub page_capacity: usize,
    pub pages_used: usize,
    pub heap_begin: PhysAddr,
    pub heap_end: PhysAddr,
    pub pheap_begin: PhysAddr,
    pub pheap_end: PhysAddr,
}

impl MemoryStatus {
    #[must_use]
    pub const fn new(stats: HeapStats, layout: &HeapLayout, pages_used: usize) -> Self {
        Self {
            total_allocations: stats.total_allocations,
            total_frees: stats.total_frees,
            memory_used: stats.memory_used,
            heap_capacity: layout.heap_capacity(),
            page_capacity: layout.page_capacity(),
            pages_used,
            heap_begin: layout.heap_begin(),
            heap_end: layout.heap_end(),
            pheap_begin: layout.pheap_begin(),
            pheap_end: layout.pheap_end(),
        }
    }

    /// Heap bytes not accounted to any Allocated block.
    #[must_use]
    pub const fn memory_free(&self) -> usize {
        self.heap_capacity.saturating_sub(self.memory_used)
    }
}

impl fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory Heap Status:")?;
        writeln!(f, " * Memory used: {} bytes", self.memory_used)?;
        writeln!(f, " * Memory free: {} bytes", self.memory_free())?;
        writeln!(f, " * Allocations: {}, frees: {}", self.total_allocations, self.total_frees)?;
        writeln!(f)?;
        writeln!(f, " * Memory-Heap size: {} bytes", self.heap_capacity)?;
        writeln!(f, " * Memory-Heap head: {}", self.heap_begin)?;
        writeln!(f, " * Memory-Heap tail: {}", self.heap_end)?;
        writeln!(f)?;
        writeln!(f, " * Paging-Heap size: {} bytes", self.page_capacity)?;
        writeln!(f, " * Paging-Heap head: {}", self.pheap_begin)?;
        writeln!(f, " * Paging-Heap tail: {}", self.pheap_end)?;
        write!(f, " * Paging-Heap pages used: {}", self.pages_used)
    }
}
