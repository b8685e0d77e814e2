//! # Kernel synchronization primitives
//!
//! The heap is a single global resource that interrupt handlers may touch, so
//! every critical section runs under [`SpinLock::lock_irq`]: interrupts are
//! masked first, then the lock is taken, and both are released in reverse order.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::IrqGuard;
pub use spin_lock::{IrqSpinLockGuard, SpinLock, SpinLockGuard};
