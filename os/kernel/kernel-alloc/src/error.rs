use crate::PhysAddr;

/// Boot-time failure. The only unrecoverable condition in the heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("invalid kernel end address (zero)")]
    NullKernelEnd,
    #[error("heap region is empty: begin {begin} >= end {end}")]
    EmptyHeap { begin: PhysAddr, end: PhysAddr },
    #[error("memory window {base}+{len:#x} does not match the heap span {begin}..{end}")]
    WindowMismatch {
        base: PhysAddr,
        len: usize,
        begin: PhysAddr,
        end: PhysAddr,
    },
    #[error("invalid heap configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to allocate the page bitmap: {0}")]
    Bitmap(#[source] AllocError),
}

/// Allocation request that could not be satisfied. State is unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("zero-sized allocation request")]
    InvalidArgument,
    #[error("out of memory ({requested} requested)")]
    OutOfMemory { requested: usize },
}

/// Release that was rejected. Logged by the allocator; state is unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
    #[error("attempting to free a null pointer")]
    NullPointer,
    #[error("corrupted or foreign block at {0}")]
    CorruptedBlock(PhysAddr),
    #[error("double free at {0}")]
    DoubleFree(PhysAddr),
    #[error("address {0} out of paging heap range")]
    PageIndexOutOfRange(PhysAddr),
    #[error("address {0} is not page aligned")]
    UnalignedPage(PhysAddr),
    #[error("block at {0} is reserved by the allocator")]
    Reserved(PhysAddr),
}
