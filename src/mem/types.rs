//! Basic types and utilities for dealing with memory.

use core::fmt::{self, Debug, Display, Formatter};
use core::ops::{Add, Sub};

/// Convenience constants and functions for dealing with memory sizes.
pub mod size {
    /// The number of bytes in 1 KiB.
    pub const KB: usize = 1024;

    /// The number of bytes in 1 MiB.
    pub const MB: usize = 1024 * KB;
}

/// A raw virtual address.
pub type RawVirtualAddress = usize;

/// The previous number with the given alignment.
#[inline]
pub const fn align_down(n: usize, align: usize) -> usize {
    n & !(align - 1)
}

/// The next number with the given alignment, if it is representable.
#[inline]
pub const fn align_up(n: usize, align: usize) -> Option<usize> {
    match n.checked_add(align - 1) {
        Some(v) => Some(align_down(v, align)),
        None => None,
    }
}

/// An address in the flat kernel address space.
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct VirtualAddress(RawVirtualAddress);

impl VirtualAddress {
    pub const fn new(address: RawVirtualAddress) -> VirtualAddress {
        VirtualAddress(address)
    }

    /// Create a virtual address from a pointer.
    pub fn from_ptr<T>(ptr: *const T) -> VirtualAddress {
        VirtualAddress(ptr as usize)
    }

    /// The underlying address.
    pub const fn raw(&self) -> RawVirtualAddress {
        self.0
    }

    /// Check whether the address has the given alignment.
    pub const fn is_aligned(&self, align: usize) -> bool {
        self.0 % align == 0
    }

    /// Get the next address of the given alignment.
    pub const fn next_aligned(&self, align: usize) -> Option<VirtualAddress> {
        match align_up(self.0, align) {
            Some(v) => Some(VirtualAddress(v)),
            None => None,
        }
    }

    /// Offset the address, failing on overflow.
    pub const fn checked_add(&self, rhs: usize) -> Option<VirtualAddress> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(VirtualAddress(v)),
            None => None,
        }
    }

    /// Offset the address, clamping at the top of the address space.
    pub const fn saturating_add(&self, rhs: usize) -> VirtualAddress {
        VirtualAddress(self.0.saturating_add(rhs))
    }

    /// The distance from `rhs` up to `self`, or `None` if `rhs` lies above.
    pub const fn checked_sub(&self, rhs: VirtualAddress) -> Option<usize> {
        self.0.checked_sub(rhs.0)
    }
}

impl Display for VirtualAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "VirtualAddress(0x{:x})", self.raw())
    }
}

impl Debug for VirtualAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        <VirtualAddress as Display>::fmt(self, f)
    }
}

impl Add<usize> for VirtualAddress {
    type Output = VirtualAddress;

    fn add(self, rhs: usize) -> VirtualAddress {
        self.checked_add(rhs)
            .expect("Virtual address addition overflowed.")
    }
}

impl Sub<VirtualAddress> for VirtualAddress {
    type Output = usize;

    fn sub(self, rhs: VirtualAddress) -> usize {
        self.checked_sub(rhs)
            .expect("Virtual address subtraction overflowed.")
    }
}
