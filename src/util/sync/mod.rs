//! Synchronization utilities.
//!
//! The kernel runs on a single core with interrupts disabled during boot, so
//! these only need to keep `static` items sound and catch reentrancy.

pub mod once_cell;
pub mod spin;

pub use once_cell::OnceCell;
pub use spin::Spinlock;
