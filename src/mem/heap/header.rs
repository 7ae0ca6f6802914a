//! Block headers and size classes.
//!
//! Every block in the heap region, free or allocated, starts with a packed
//! 4-byte header: a 16-bit magic value, 8 bits of flags and an 8-bit size
//! class. The byte capacity of a block, header included, is
//! `GRANULE << size_class`. Headers are stored little-endian.

use bitflags::bitflags;

/// log2 of the [granule](GRANULE).
pub const GRANULE_SHIFT: u32 = 6;
/// The smallest block capacity, i.e. the capacity of size class 0. Every block
/// starts on a granule boundary.
pub const GRANULE: usize = 1 << GRANULE_SHIFT;
/// The number of bytes a header occupies at the start of its block.
pub const HEADER_SIZE: usize = 4;
/// Marks a header as written by the heap.
pub const MAGIC: u16 = 0xB6A0;

bitflags! {
    /// Status and type bits of a block.
    pub struct BlockFlags: u8 {
        /// The block is allocated.
        const USED = 0b0001;
        /// The block can never be freed.
        const RESERVED = 0b0010;
        /// The block holds plain data, such as arrays.
        const DATA = 0b0100;
        /// The block holds an object or code.
        const CODE = 0b1000;
        /// The bits a caller may ask for when allocating.
        const REQUESTABLE = Self::RESERVED.bits | Self::DATA.bits | Self::CODE.bits;
    }
}

/// A power-of-two capacity index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SizeClass(u8);

impl SizeClass {
    /// The largest class whose capacity still fits in a `usize`.
    pub const MAX: SizeClass = SizeClass((usize::BITS - 1 - GRANULE_SHIFT) as u8);

    pub const fn new(class: u8) -> Option<SizeClass> {
        if class > SizeClass::MAX.0 {
            None
        } else {
            Some(SizeClass(class))
        }
    }

    /// The smallest class able to hold `bytes` bytes, header included.
    pub fn for_block(bytes: usize) -> Option<SizeClass> {
        if bytes <= GRANULE {
            return Some(SizeClass(0));
        }
        let capacity = bytes.checked_next_power_of_two()?;
        SizeClass::new((capacity.trailing_zeros() - GRANULE_SHIFT) as u8)
    }

    /// The smallest class able to hold a payload of `size` bytes.
    pub fn for_payload(size: usize) -> Option<SizeClass> {
        SizeClass::for_block(size.checked_add(HEADER_SIZE)?)
    }

    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Block capacity in bytes, header included.
    pub const fn capacity(&self) -> usize {
        GRANULE << self.0
    }

    /// Payload capacity in bytes.
    pub const fn payload_capacity(&self) -> usize {
        self.capacity() - HEADER_SIZE
    }
}

/// A decoded block header. Any 4 bytes decode into a header; only those
/// carrying [MAGIC](MAGIC) and a representable size class are
/// [valid](BlockHeader::is_valid).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    magic: u16,
    flags: BlockFlags,
    size_class: u8,
}

impl BlockHeader {
    /// A fresh header for an allocated block.
    pub fn allocated(flags: BlockFlags, class: SizeClass) -> BlockHeader {
        BlockHeader {
            magic: MAGIC,
            flags: (flags & BlockFlags::REQUESTABLE) | BlockFlags::USED,
            size_class: class.raw(),
        }
    }

    pub fn decode(bytes: [u8; HEADER_SIZE]) -> BlockHeader {
        BlockHeader {
            magic: u16::from_le_bytes([bytes[0], bytes[1]]),
            flags: BlockFlags::from_bits_truncate(bytes[2]),
            size_class: bytes[3],
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let magic = self.magic.to_le_bytes();
        [magic[0], magic[1], self.flags.bits(), self.size_class]
    }

    /// Whether the header was written by the heap.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && SizeClass::new(self.size_class).is_some()
    }

    pub fn is_allocated(&self) -> bool {
        self.is_valid() && self.flags.contains(BlockFlags::USED)
    }

    pub fn is_reserved(&self) -> bool {
        self.is_valid() && self.flags.contains(BlockFlags::RESERVED)
    }

    pub fn is_data(&self) -> bool {
        self.is_valid() && self.flags.contains(BlockFlags::DATA)
    }

    pub fn is_code(&self) -> bool {
        self.is_valid() && self.flags.contains(BlockFlags::CODE)
    }

    pub fn flags(&self) -> BlockFlags {
        self.flags
    }

    /// The size class, for valid headers.
    pub fn size_class(&self) -> Option<SizeClass> {
        if self.magic == MAGIC {
            SizeClass::new(self.size_class)
        } else {
            None
        }
    }

    /// Block capacity in bytes, header included, for valid headers.
    pub fn capacity(&self) -> Option<usize> {
        self.size_class().map(|c| c.capacity())
    }

    /// Mark the block free. Reserved blocks stay untouched. Returns whether
    /// the header changed.
    pub fn release(&mut self) -> bool {
        if self.flags.contains(BlockFlags::RESERVED) || !self.flags.contains(BlockFlags::USED) {
            return false;
        }
        self.flags.remove(BlockFlags::USED);
        true
    }
}
