//! Runtime tunables for the heap and the page pool.

use crate::InitError;
use kernel_info::memory::{
    BLOCK_PADDING, DEFRAG_INTERVAL, MAX_PAGES, MIN_SPLIT_REMAINDER, PAGE_POOL_TOP, PAGE_SIZE,
};

/// Allocator tunables.
///
/// [`Default`] yields the kernel's compiled-in layout from
/// [`kernel_info::memory`]. Tests shrink `pool_top` to keep the simulated
/// window small.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Trailing bytes after each block payload.
    pub block_padding: usize,
    /// Minimum remainder (exclusive) for a free block to be split on reuse.
    pub split_threshold: usize,
    /// Page size of the page pool. Power of two.
    pub page_size: usize,
    /// Number of pages in the pool.
    pub max_pages: usize,
    /// Every n-th successful free runs a defragmentation pass; `0` disables it.
    pub defrag_interval: usize,
    /// Exclusive upper bound of the page pool.
    pub pool_top: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block_padding: BLOCK_PADDING,
            split_threshold: MIN_SPLIT_REMAINDER,
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
            defrag_interval: DEFRAG_INTERVAL,
            pool_top: PAGE_POOL_TOP,
        }
    }

    #[must_use]
    pub const fn with_pool_top(mut self, pool_top: usize) -> Self {
        self.pool_top = pool_top;
        self
    }

    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub const fn with_split_threshold(mut self, split_threshold: usize) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    #[must_use]
    pub const fn with_defrag_interval(mut self, defrag_interval: usize) -> Self {
        self.defrag_interval = defrag_interval;
        self
    }

    /// Size of the page pool in bytes, if it does not overflow.
    #[must_use]
    pub const fn pool_size(&self) -> Option<usize> {
        self.max_pages.checked_mul(self.page_size)
    }

    /// Checks the invariants the allocators rely on.
    ///
    /// # Errors
    /// [`InitError::InvalidConfig`] naming the first violated constraint.
    pub const fn validate(&self) -> Result<(), InitError> {
        if !self.page_size.is_power_of_two() {
            return Err(InitError::InvalidConfig("page size must be a power of two"));
        }
        if self.max_pages == 0 {
            return Err(InitError::InvalidConfig("page pool must hold at least one page"));
        }
        if !self.pool_top.is_multiple_of(self.page_size) {
            return Err(InitError::InvalidConfig("pool top must be page aligned"));
        }
        match self.pool_size() {
            Some(size) if size <= self.pool_top => Ok(()),
            _ => Err(InitError::InvalidConfig("page pool does not fit below pool top")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kernel_layout() {
        let cfg = HeapConfig::default();
        assert_eq!(cfg.page_size, 4096);
        assert_eq!(cfg.max_pages, 32);
        assert_eq!(cfg.split_threshold, 64);
        assert_eq!(cfg.defrag_interval, 10);
        assert_eq!(cfg.pool_size(), Some(32 * 4096));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_page_geometry() {
        let mut cfg = HeapConfig::new();
        cfg.page_size = 3000;
        assert!(matches!(cfg.validate(), Err(InitError::InvalidConfig(_))));

        let cfg = HeapConfig::new().with_max_pages(0);
        assert!(matches!(cfg.validate(), Err(InitError::InvalidConfig(_))));

        let cfg = HeapConfig::new().with_pool_top(0x10_0800);
        assert!(matches!(cfg.validate(), Err(InitError::InvalidConfig(_))));

        let cfg = HeapConfig::new().with_pool_top(0x1000).with_max_pages(2);
        assert!(matches!(cfg.validate(), Err(InitError::InvalidConfig(_))));
    }
}
