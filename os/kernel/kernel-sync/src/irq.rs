//! Interrupt masking.
//!
//! On bare-metal `x86_64` (`target_os = "none"`) the guard uses `pushfq`/`cli`/`sti`.
//! On hosted targets, where unit tests run in user mode and `cli` would fault,
//! interrupts are reported as disabled and the guard does nothing.

/// Bit 9 of `RFLAGS`: interrupt enable flag.
const RFLAGS_IF: u64 = 1 << 9;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod arch {
    /// Disables hardware interrupts (`cli`).
    ///
    /// # Safety & Privilege
    ///
    /// Must only be called in contexts where `cli` is permitted.
    #[inline]
    pub fn cli_stop_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    /// Enables hardware interrupts (`sti`).
    #[inline]
    pub fn sti_enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    /// Returns the current `RFLAGS` value (via `pushfq/pop`).
    #[inline]
    #[must_use]
    pub fn rflags() -> u64 {
        let r: u64;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags)) }
        r
    }
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
mod arch {
    #[inline]
    pub const fn cli_stop_interrupts() {}

    #[inline]
    pub const fn sti_enable_interrupts() {}

    #[inline]
    #[must_use]
    pub const fn rflags() -> u64 {
        0
    }
}

pub use arch::{cli_stop_interrupts, rflags, sti_enable_interrupts};

/// Returns whether hardware interrupts are currently enabled.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    (rflags() & RFLAGS_IF) != 0
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the `IF` bit. If interrupts were enabled, it
/// executes `cli`. On drop, it executes `sti` **only** if they were previously
/// enabled, so nested guards compose.
///
/// # Examples
///
/// ```
/// use kernel_sync::irq::{IrqGuard, interrupts_enabled};
///
/// let before = interrupts_enabled();
/// {
///     let _g = IrqGuard::new();
///     assert!(!interrupts_enabled());
/// }
/// assert_eq!(interrupts_enabled(), before);
/// ```
pub struct IrqGuard {
    /// Whether interrupts were enabled (IF=1) when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        if enabled {
            cli_stop_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }

    /// Whether this guard will re-enable interrupts when dropped.
    #[inline]
    #[must_use]
    pub const fn restores_interrupts(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosted_guard_is_inert() {
        assert!(!interrupts_enabled());
        let g = IrqGuard::new();
        assert!(!g.restores_interrupts());
        drop(g);
        assert!(!interrupts_enabled());
    }

    #[test]
    fn nested_guards_do_not_restore_early() {
        let outer = IrqGuard::new();
        {
            let inner = IrqGuard::new();
            assert!(!inner.restores_interrupts());
        }
        assert!(!interrupts_enabled());
        drop(outer);
    }
}
