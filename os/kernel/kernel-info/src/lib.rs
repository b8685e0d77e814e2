//! # Kernel Memory Configuration
//!
//! This crate defines the physical memory layout constants and allocator
//! tunables shared between the boot path and the kernel heap. It is the single
//! source of truth for where the general heap and the page pool live, and for
//! the knobs that shape block bookkeeping.
//!
//! ## Physical Memory Layout
//!
//! The heap is carved out of low physical memory directly after the loaded
//! kernel image. Both regions are fixed for the lifetime of the kernel:
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000   ┌─────────────────────────────────┐
//!               │     Low Memory (< 1MiB)         │
//!               │  (BIOS, VGA, DMA buffers)       │
//! PHYS_LOAD     ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!               │       Kernel Image              │
//!               │   (Text, Data, BSS)             │
//! kernel_end    ├─────────────────────────────────┤
//!               │   (rounded up to 4 KiB)         │
//! heap_begin    ├─────────────────────────────────┤
//!               │       General Heap              │
//!               │  (first-fit block allocator)    │
//! heap_end ==   ├─────────────────────────────────┤
//! pheap_begin   │        Page Pool                │
//!               │  (MAX_PAGES × PAGE_SIZE)        │
//! PAGE_POOL_TOP └─────────────────────────────────┘ 0x0100_0000 (16 MiB)
//! ```
//!
//! * **Adjacent Regions**: the heap ends exactly where the page pool begins
//! * **Fixed Pool**: the pool always spans `MAX_PAGES * PAGE_SIZE` bytes
//! * **Boot Derived**: only `kernel_end` is a runtime input
//!
//! ## Configuration Management
//!
//! All values are `const` and validated with compile-time assertions. The heap
//! crate lifts them into a runtime configuration so tests can shrink the
//! regions without touching these defaults.
//!
//! ```rust
//! use kernel_info::memory::{MAX_PAGES, PAGE_POOL_TOP, PAGE_SIZE};
//!
//! let pheap_begin = PAGE_POOL_TOP - MAX_PAGES * PAGE_SIZE;
//! assert_eq!(pheap_begin, 0x00FE_0000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
