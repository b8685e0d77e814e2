//! # Memory Layout

/// Where the kernel image is placed in *physical* memory.
pub const PHYS_LOAD: usize = 0x0010_0000; // 1 MiB

/// Granularity used to round the kernel end up to the first heap byte.
pub const HEAP_ALIGN: usize = 0x1000;

/// Top of the page pool; the pool grows down from here.
pub const PAGE_POOL_TOP: usize = 0x0100_0000; // 16 MiB

/// Size of a single page handed out by the page allocator.
pub const PAGE_SIZE: usize = 4096;

/// Number of pages tracked by the page bitmap.
pub const MAX_PAGES: usize = 32;

/// Size of the in-place header preceding every heap block.
///
/// Layout: `magic: u32`, `status: u8`, three reserved bytes, `size: u32`.
pub const BLOCK_HEADER_SIZE: usize = 12;

/// Trailing bytes after every block payload.
pub const BLOCK_PADDING: usize = 4;

/// A free block is only split if the remainder exceeds this many bytes.
pub const MIN_SPLIT_REMAINDER: usize = 64;

/// Every n-th successful block free triggers a coalescing pass.
pub const DEFRAG_INTERVAL: usize = 10;

/// Marker stamped into every live block header.
pub const HEAP_MAGIC: u32 = 0x4845_4150;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(HEAP_ALIGN.is_power_of_two());
    assert!(PAGE_POOL_TOP.is_multiple_of(PAGE_SIZE));
    assert!(MAX_PAGES * PAGE_SIZE < PAGE_POOL_TOP - PHYS_LOAD);
    assert!(BLOCK_HEADER_SIZE >= 9);
};
