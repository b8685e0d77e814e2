//! Physical address newtype.

use core::fmt;
use core::ops::{Add, Sub};

/// A physical memory address inside the managed window.
///
/// The heap never translates addresses, so this is a plain offset-carrying
/// wrapper that keeps raw `usize` arithmetic out of the public API.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct PhysAddr(usize);

impl PhysAddr {
    /// The null address. Never handed out by either allocator.
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Round up to `align` (must be a power of two). Returns `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn align_up(self, align: usize) -> Option<Self> {
        debug_assert!(align.is_power_of_two());
        match self.0.checked_add(align - 1) {
            Some(v) => Some(Self(v & !(align - 1))),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: usize) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn checked_sub(self, rhs: usize) -> Option<Self> {
        match self.0.checked_sub(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Byte distance from `base` to `self`, if `self >= base`.
    #[inline]
    #[must_use]
    pub const fn offset_from(self, base: Self) -> Option<usize> {
        self.0.checked_sub(base.0)
    }
}

impl Add<usize> for PhysAddr {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub<usize> for PhysAddr {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: usize) -> Self {
        Self(self.0 - rhs)
    }
}

impl From<usize> for PhysAddr {
    #[inline]
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_boundary() {
        assert_eq!(PhysAddr::new(0x10_0001).align_up(0x1000), Some(PhysAddr::new(0x10_1000)));
        assert_eq!(PhysAddr::new(0x10_1000).align_up(0x1000), Some(PhysAddr::new(0x10_1000)));
        assert_eq!(PhysAddr::new(usize::MAX).align_up(0x1000), None);
    }

    #[test]
    fn offsets() {
        let base = PhysAddr::new(0x2000);
        assert_eq!((base + 0x30).offset_from(base), Some(0x30));
        assert_eq!(base.offset_from(base + 1), None);
        assert_eq!(PhysAddr::new(0x10).checked_sub(0x20), None);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(format!("{}", PhysAddr::new(0x1234)), "0x00001234");
        assert_eq!(format!("{:?}", PhysAddr::new(0x1234)), "PhysAddr(0x1234)");
    }
}
