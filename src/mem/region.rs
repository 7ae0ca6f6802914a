//! The address window managed by the heap.

use core::fmt::{self, Display, Formatter};

use super::VirtualAddress;

/// A half-open address range `[lower, upper)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddressRegion {
    /// First address inside the region.
    lower: VirtualAddress,
    /// First address past the region.
    upper: VirtualAddress,
}

impl AddressRegion {
    /// Create a new region. Fails if `upper < lower`.
    pub const fn new(lower: VirtualAddress, upper: VirtualAddress) -> Option<AddressRegion> {
        if upper.raw() < lower.raw() {
            None
        } else {
            Some(AddressRegion { lower, upper })
        }
    }

    pub const fn lower(&self) -> VirtualAddress {
        self.lower
    }

    pub const fn upper(&self) -> VirtualAddress {
        self.upper
    }

    /// The number of bytes in the region.
    pub const fn size(&self) -> usize {
        self.upper.raw() - self.lower.raw()
    }

    /// Whether `address` lies inside the region.
    pub fn contains(&self, address: VirtualAddress) -> bool {
        self.lower <= address && address < self.upper
    }

    /// Whether the whole span `[start, start + len)` lies inside the region.
    pub fn contains_span(&self, start: VirtualAddress, len: usize) -> bool {
        match start.checked_add(len) {
            Some(end) => self.lower <= start && end <= self.upper,
            None => false,
        }
    }
}

impl Display for AddressRegion {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[0x{:x}, 0x{:x})", self.lower.raw(), self.upper.raw())
    }
}
