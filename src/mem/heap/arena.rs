//! Backing memory of the heap.

use super::header::{BlockHeader, HEADER_SIZE};
use crate::mem::{raw, AddressRegion, VirtualAddress};

/// A byte arena and the address its first byte lives at. All heap accesses
/// go through checked offsets into the arena.
pub struct Arena<'a> {
    base: VirtualAddress,
    bytes: &'a mut [u8],
}

impl<'a> Arena<'a> {
    /// An arena whose addresses are the real addresses of `bytes`.
    pub fn from_slice(bytes: &'a mut [u8]) -> Arena<'a> {
        Arena {
            base: VirtualAddress::from_ptr(bytes.as_ptr()),
            bytes,
        }
    }

    /// An arena whose first byte is known by the address `base`, which need
    /// not match where `bytes` really lives.
    pub fn with_base(base: VirtualAddress, bytes: &'a mut [u8]) -> Arena<'a> {
        Arena { base, bytes }
    }

    /// The addresses covered by the arena.
    pub fn span(&self) -> AddressRegion {
        AddressRegion::new(self.base, self.base.saturating_add(self.bytes.len()))
            .expect("Arena span cannot be inverted.")
    }

    fn offset(&self, address: VirtualAddress, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)?;
        if offset.checked_add(len)? <= self.bytes.len() {
            Some(offset)
        } else {
            None
        }
    }

    /// Read the header bytes at `address`.
    pub fn header(&self, address: VirtualAddress) -> Option<BlockHeader> {
        let offset = self.offset(address, HEADER_SIZE)?;
        let mut bytes = [0; HEADER_SIZE];
        bytes.copy_from_slice(&self.bytes[offset..offset + HEADER_SIZE]);
        Some(BlockHeader::decode(bytes))
    }

    /// Write a header at `address`. Returns whether it fit in the arena.
    pub fn set_header(&mut self, address: VirtualAddress, header: &BlockHeader) -> bool {
        match self.offset(address, HEADER_SIZE) {
            Some(offset) => {
                self.bytes[offset..offset + HEADER_SIZE].copy_from_slice(&header.encode());
                true
            }
            None => false,
        }
    }

    /// Fill `len` bytes at `address` with `value`. Returns whether the span
    /// fit in the arena.
    pub fn fill(&mut self, address: VirtualAddress, len: usize, value: u8) -> bool {
        match self.offset(address, len) {
            Some(offset) => {
                // The span was checked against the arena just above.
                unsafe { raw::fill(self.bytes.as_mut_ptr().add(offset), len, value) };
                true
            }
            None => false,
        }
    }

    /// The bytes at `[address, address + len)`.
    pub fn bytes(&self, address: VirtualAddress, len: usize) -> Option<&[u8]> {
        let offset = self.offset(address, len)?;
        Some(&self.bytes[offset..offset + len])
    }

    /// A real pointer to the byte at `address`.
    pub fn pointer(&mut self, address: VirtualAddress) -> Option<*mut u8> {
        let offset = self.offset(address, 0)?;
        Some(self.bytes.as_mut_ptr().wrapping_add(offset))
    }

    /// The arena address of a real pointer into the arena.
    pub fn address(&self, pointer: *const u8) -> Option<VirtualAddress> {
        let start = self.bytes.as_ptr() as usize;
        let offset = (pointer as usize).checked_sub(start)?;
        if offset <= self.bytes.len() {
            self.base.checked_add(offset)
        } else {
            None
        }
    }
}
