//! # Kernel Heap
//!
//! This crate provides the kernel's dynamic memory: a byte-granularity block
//! allocator for general use and a page allocator for page-table-sized
//! allocations. Both operate over a fixed physical window directly after the
//! kernel image, with no operating system, no paging and no threads beneath
//! them.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  KernelMemory                       │
//! │    • Single owner, built once at boot               │
//! │    • IRQ-masking spinlock around every entry point  │
//! └──────────────┬──────────────────────┬───────────────┘
//!                │                      │
//! ┌──────────────▼──────────┐ ┌─────────▼───────────────┐
//! │     BlockAllocator      │ │      PageAllocator      │
//! │  • First-fit, in-place  │ │  • Fixed 4 KiB pages    │
//! │    headers              │ │  • Byte-per-page bitmap │
//! │  • Split + coalesce     │ │    stored in the heap   │
//! └──────────────┬──────────┘ └─────────────────────────┘
//!                │
//! ┌──────────────▼──────────────────────────────────────┐
//! │                   PhysWindow                        │
//! │    • Bounds-checked view of [heap_begin, pheap_end) │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Bring-up order
//!
//! 1. Boot hands over `kernel_end`; [`HeapLayout::compute`] derives the heap
//!    and the page pool from it and the [`HeapConfig`].
//! 2. [`BlockAllocator::new`] zeroes the heap.
//! 3. [`PageAllocator::new`] allocates its bitmap *through* the block
//!    allocator, which is why it takes `&mut BlockAllocator`.
//!
//! [`KernelMemory::new`] performs all three steps.
//!
//! ## Error model
//!
//! Only [`InitError`] is fatal. Allocation failures are [`AllocError`]s, which
//! the [`KernelMemory`] entry points surface as `None`. Bad frees are
//! [`FreeError`]s; they are logged and leave all state unchanged.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{HeapConfig, HeapLayout, KernelMemory, PhysAddr, PhysWindow};
//!
//! let kernel_end = PhysAddr::new(0x0010_0000);
//! let config = HeapConfig::default();
//! let layout = HeapLayout::compute(kernel_end, &config).unwrap();
//!
//! // Stand-in for physical RAM.
//! let mut ram = vec![0u8; layout.span()];
//! let window = PhysWindow::from_slice(layout.heap_begin(), &mut ram);
//! let memory = KernelMemory::new(kernel_end, window, config).unwrap();
//!
//! let block = memory.allocate_block(100).unwrap();
//! let page = memory.allocate_pages(1).unwrap();
//! assert_eq!(page, layout.pheap_begin());
//!
//! memory.free_block(block).unwrap();
//! memory.free_pages(page).unwrap();
//! assert_eq!(memory.status().total_frees, 1);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod addr;
pub mod block_alloc;
mod config;
mod error;
pub mod header;
mod kernel_memory;
mod layout;
pub mod page_alloc;
mod stats;
mod window;

pub use addr::PhysAddr;
pub use block_alloc::{BlockAllocator, BlockInfo};
pub use config::HeapConfig;
pub use error::{AllocError, FreeError, InitError};
pub use header::{BLOCK_HEADER_SIZE, BlockStatus};
pub use kernel_memory::KernelMemory;
pub use layout::HeapLayout;
pub use page_alloc::PageAllocator;
pub use stats::{HeapStats, MemoryStatus};
pub use window::PhysWindow;
