//! In-place block header.
//!
//! Every heap block looks like this in memory:
//!
//! ```text
//! +-------+--------+-----+------+----------------+---------+
//! | magic | status | rsv | size |  payload(size) | padding |
//! |  u32  |   u8   | 3B  | u32  |                |         |
//! +-------+--------+-----+------+----------------+---------+
//! ^ header                      ^ header + BLOCK_HEADER_SIZE
//! ```
//!
//! All fields are little-endian. A header is *valid* only while its magic is
//! [`HEAP_MAGIC`] and its status byte is known; merged blocks have their
//! header zeroed and are never read for their size again.

use crate::{PhysAddr, PhysWindow};
use kernel_info::memory::HEAP_MAGIC;

pub use kernel_info::memory::BLOCK_HEADER_SIZE;

const MAGIC_OFFSET: usize = 0;
const STATUS_OFFSET: usize = 4;
const SIZE_OFFSET: usize = 8;

/// Allocation state of a block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockStatus {
    Free,
    Allocated,
}

impl BlockStatus {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Allocated => 1,
        }
    }

    const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Free),
            1 => Some(Self::Allocated),
            _ => None,
        }
    }
}

/// Decoded view of a valid header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub status: BlockStatus,
    pub size: u32,
}

impl BlockHeader {
    #[must_use]
    pub const fn new(status: BlockStatus, size: u32) -> Self {
        Self { status, size }
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.status, BlockStatus::Free)
    }

    /// Payload size in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Decode the header at `at`, or `None` if it is out of the window or invalid.
    #[must_use]
    pub fn read(window: &PhysWindow<'_>, at: PhysAddr) -> Option<Self> {
        if window.read_u32(at + MAGIC_OFFSET)? != HEAP_MAGIC {
            return None;
        }
        let status = BlockStatus::from_u8(window.read_u8(at + STATUS_OFFSET)?)?;
        let size = window.read_u32(at + SIZE_OFFSET)?;
        Some(Self { status, size })
    }

    /// Stamp this header (magic included) at `at`.
    pub fn write(self, window: &mut PhysWindow<'_>, at: PhysAddr) -> bool {
        match window.bytes_mut(at, BLOCK_HEADER_SIZE) {
            Some(raw) => {
                raw.fill(0);
                raw[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&HEAP_MAGIC.to_le_bytes());
                raw[STATUS_OFFSET] = self.status.as_u8();
                raw[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&self.size.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Wipe the header at `at` so it can never validate again.
    pub fn invalidate(window: &mut PhysWindow<'_>, at: PhysAddr) -> bool {
        window.zero(at, BLOCK_HEADER_SIZE)
    }
}
