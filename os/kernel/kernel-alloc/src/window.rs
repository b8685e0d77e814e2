//! Bounds-checked byte view over the managed physical range.
//!
//! All header and payload access goes through [`PhysWindow`], which translates
//! a [`PhysAddr`] to an offset into its backing slice. Out-of-range accesses
//! return `None` instead of touching memory outside the window.

use crate::PhysAddr;
use core::ops::Range;

/// Exclusive view of the physical bytes `[base, base + len)`.
///
/// In the kernel the window is built from the raw identity-mapped range with
/// [`PhysWindow::from_raw`]. Hosted tests back it with a `Vec<u8>` through
/// [`PhysWindow::from_slice`], pretending the buffer lives at `base`.
pub struct PhysWindow<'a> {
    base: PhysAddr,
    bytes: &'a mut [u8],
}

impl<'a> PhysWindow<'a> {
    /// Wrap a borrowed buffer that stands in for physical memory at `base`.
    #[must_use]
    pub const fn from_slice(base: PhysAddr, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    #[must_use]
    pub const fn base(&self) -> PhysAddr {
        self.base
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Exclusive end address of the window.
    #[must_use]
    pub const fn end(&self) -> PhysAddr {
        PhysAddr::new(self.base.as_usize() + self.bytes.len())
    }

    fn range(&self, addr: PhysAddr, len: usize) -> Option<Range<usize>> {
        let start = addr.offset_from(self.base)?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    /// Borrow `len` bytes at `addr`.
    #[must_use]
    pub fn bytes(&self, addr: PhysAddr, len: usize) -> Option<&[u8]> {
        let range = self.range(addr, len)?;
        Some(&self.bytes[range])
    }

    /// Mutably borrow `len` bytes at `addr`.
    #[must_use]
    pub fn bytes_mut(&mut self, addr: PhysAddr, len: usize) -> Option<&mut [u8]> {
        let range = self.range(addr, len)?;
        Some(&mut self.bytes[range])
    }

    /// Zero `len` bytes at `addr`. Returns `false` if the range leaves the window.
    pub fn zero(&mut self, addr: PhysAddr, len: usize) -> bool {
        self.bytes_mut(addr, len).map(|b| b.fill(0)).is_some()
    }

    #[must_use]
    pub fn read_u8(&self, addr: PhysAddr) -> Option<u8> {
        self.bytes(addr, 1).map(|b| b[0])
    }

    pub fn write_u8(&mut self, addr: PhysAddr, value: u8) -> bool {
        self.bytes_mut(addr, 1).map(|b| b[0] = value).is_some()
    }

    #[must_use]
    pub fn read_u32(&self, addr: PhysAddr) -> Option<u32> {
        let b = self.bytes(addr, 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_u32(&mut self, addr: PhysAddr, value: u32) -> bool {
        self.bytes_mut(addr, 4)
            .map(|b| b.copy_from_slice(&value.to_le_bytes()))
            .is_some()
    }
}

impl PhysWindow<'static> {
    /// Wrap the identity-mapped physical range `[base, base + len)`.
    ///
    /// # Safety
    /// - The range must be valid, writable RAM, directly addressable at `base`.
    /// - It must not be accessed through any other path for `'static`.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn from_raw(base: PhysAddr, len: usize) -> Self {
        let ptr = base.as_usize() as *mut u8;
        let bytes = unsafe { core::slice::from_raw_parts_mut(ptr, len) };
        Self { base, bytes }
    }
}
