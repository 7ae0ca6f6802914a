//! The block allocator.
//!
//! There is no free list. Every search walks the region forward in address
//! order, one granule at a time over free space and one block at a time over
//! allocated blocks, so every operation is bounded by the size of the region.
//! Blocks are never split, merged or moved.

use log_crate::{debug, trace, warn};

use super::arena::Arena;
use super::header::{BlockFlags, BlockHeader, SizeClass, GRANULE, HEADER_SIZE};
use super::HeapError;
use crate::mem::{AddressRegion, VirtualAddress};

/// The byte written over a payload when it is freed with a known size.
pub const SCRUB_BYTE: u8 = 0;

/// First-fit allocator over a region of an [Arena](Arena).
pub struct BlockAllocator<'a> {
    arena: Arena<'a>,
    region: AddressRegion,
}

/// Check that `region` could be managed inside `arena` at all.
fn check_window(arena: &Arena, region: &AddressRegion) -> Result<(), HeapError> {
    if !region.lower().is_aligned(GRANULE) {
        return Err(HeapError::InvalidRegion);
    }
    let span = arena.span();
    if region.lower() < span.lower() || region.upper() > span.upper() {
        return Err(HeapError::InvalidRegion);
    }
    Ok(())
}

impl<'a> BlockAllocator<'a> {
    /// Manage `region` of `arena`. Headers already present in the region are
    /// honored, so the region should normally be zeroed first.
    pub fn new(arena: Arena<'a>, region: AddressRegion) -> Result<BlockAllocator<'a>, HeapError> {
        check_window(&arena, &region)?;
        let ret = BlockAllocator { arena, region };
        ret.validate();
        Ok(ret)
    }

    /// The managed region.
    pub fn region(&self) -> AddressRegion {
        self.region
    }

    /// Move the managed window. Rejected without any change if the window is
    /// inverted, unaligned, outside the arena, smaller than the bytes
    /// currently allocated, or would leave a live block outside of it.
    pub fn set_region(
        &mut self,
        lower: VirtualAddress,
        upper: VirtualAddress,
    ) -> Result<(), HeapError> {
        let ret = self.try_set_region(lower, upper);
        if ret.is_err() {
            warn!(
                "Rejected heap region [0x{:x}, 0x{:x}), keeping {}.",
                lower.raw(),
                upper.raw(),
                self.region
            );
        }
        ret
    }

    fn try_set_region(&mut self, lower: VirtualAddress, upper: VirtualAddress) -> Result<(), HeapError> {
        let region = AddressRegion::new(lower, upper).ok_or(HeapError::InvalidRegion)?;
        check_window(&self.arena, &region)?;

        if region.size() < self.allocated_bytes() {
            return Err(HeapError::InvalidRegion);
        }
        let orphans = self.blocks().any(|(address, header)| {
            !region.contains_span(address, header.capacity().unwrap_or(GRANULE))
        });
        if orphans {
            return Err(HeapError::InvalidRegion);
        }

        self.region = region;
        self.validate();
        Ok(())
    }

    /// Total capacity of all allocated blocks, headers included.
    pub fn allocated_bytes(&self) -> usize {
        self.blocks()
            .filter_map(|(_, header)| header.capacity())
            .sum()
    }

    /// The number of allocated blocks.
    pub fn allocated_blocks(&self) -> usize {
        self.blocks().count()
    }

    /// The valid header at `address`, if there is one inside the region.
    pub fn header(&self, address: VirtualAddress) -> Option<BlockHeader> {
        if !self.region.contains_span(address, HEADER_SIZE) {
            return None;
        }
        self.arena.header(address).filter(|h| h.is_valid())
    }

    fn allocated_header(&self, address: VirtualAddress) -> Option<BlockHeader> {
        self.header(address).filter(|h| h.is_allocated())
    }

    /// The first block boundary at or after `start`. A `start` inside a live
    /// block resolves to the end of that block, never into its payload.
    fn first_slot(&self, start: VirtualAddress) -> Option<VirtualAddress> {
        if start < self.region.lower() {
            return Some(self.region.lower());
        }
        let enclosing_end = self
            .blocks()
            .take_while(|(address, _)| *address < start)
            .find_map(|(address, header)| {
                let end = address.checked_add(header.capacity()?)?;
                if start < end {
                    Some(end)
                } else {
                    None
                }
            });
        match enclosing_end {
            Some(end) => Some(end),
            None => start.next_aligned(GRANULE),
        }
    }

    /// The first allocated header at or after `slot`, which must be a block
    /// boundary outside any live block.
    fn scan_allocated(&self, slot: VirtualAddress) -> Option<VirtualAddress> {
        let mut address = slot;
        while self.region.contains_span(address, HEADER_SIZE) {
            if self.allocated_header(address).is_some() {
                return Some(address);
            }
            address = address.checked_add(GRANULE)?;
        }
        None
    }

    /// Iterate over allocated blocks in address order.
    pub fn blocks(&self) -> Blocks<'_, 'a> {
        Blocks {
            heap: self,
            next: Some(self.region.lower()),
        }
    }

    /// The first allocated block header at or after `start`.
    pub fn find_allocated_block(&self, start: VirtualAddress) -> Option<VirtualAddress> {
        self.scan_allocated(self.first_slot(start)?)
    }

    /// The first address at or after `start` where a block with a payload of
    /// `size` bytes fits in free space.
    pub fn find_available_block(&self, start: VirtualAddress, size: usize) -> Option<VirtualAddress> {
        if size == 0 {
            return None;
        }
        let needed = SizeClass::for_payload(size)?.capacity();
        if needed > self.region.size() {
            return None;
        }

        let mut address = self.first_slot(start)?;
        while self.region.contains_span(address, needed) {
            if let Some(header) = self.allocated_header(address) {
                address = address.checked_add(header.capacity()?)?;
                continue;
            }

            let run_end = self
                .scan_allocated(address)
                .unwrap_or_else(|| self.region.upper());
            if run_end - address >= needed {
                return Some(address);
            }
            address = run_end;
        }

        None
    }

    /// The header of the allocated block containing `pointer`.
    pub fn find_block(&self, pointer: VirtualAddress) -> Option<VirtualAddress> {
        if !self.region.contains(pointer) {
            return None;
        }
        self.blocks()
            .take_while(|(address, _)| *address < pointer)
            .find(|(address, header)| {
                header
                    .capacity()
                    .map_or(false, |c| pointer < address.saturating_add(c))
            })
            .map(|(address, _)| address)
    }

    /// Allocate a block with room for `size` payload bytes. `flags` may carry
    /// the [requestable](BlockFlags::REQUESTABLE) bits. Returns the payload
    /// address.
    pub fn allocate_block(&mut self, size: usize, flags: BlockFlags) -> Result<VirtualAddress, HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSizeRequest);
        }
        let class = SizeClass::for_payload(size).ok_or(HeapError::OutOfMemory)?;
        let address = match self.find_available_block(self.region.lower(), size) {
            Some(address) => address,
            None => {
                debug!("Out of heap memory for {} bytes in {}.", size, self.region);
                return Err(HeapError::OutOfMemory);
            }
        };

        let header = BlockHeader::allocated(flags, class);
        if !self.arena.set_header(address, &header) {
            return Err(HeapError::OutOfMemory);
        }
        self.validate();

        trace!(
            "Allocated {} bytes at {} ({:?}, capacity {}).",
            size,
            address,
            header.flags(),
            class.capacity()
        );
        Ok(address + HEADER_SIZE)
    }

    /// Free the block whose header sits at `address`. Reserved blocks are left
    /// alone.
    pub fn free_header(&mut self, address: VirtualAddress) -> Result<(), HeapError> {
        let header = self
            .allocated_header(address)
            .ok_or(HeapError::ForeignPointer)?;
        self.release(address, header);
        Ok(())
    }

    /// Free the block containing `pointer`.
    pub fn free_block(&mut self, pointer: VirtualAddress) -> Result<(), HeapError> {
        let address = self.resolve(pointer)?;
        self.free_header(address)
    }

    /// Free the block containing `pointer`, which the caller used for `size`
    /// bytes. The whole payload is scrubbed either way; a `size` running past
    /// the block end is only reported.
    pub fn free_block_sized(&mut self, pointer: VirtualAddress, size: usize) -> Result<(), HeapError> {
        let address = self.resolve(pointer)?;
        let header = self
            .allocated_header(address)
            .ok_or(HeapError::ForeignPointer)?;

        let end = address.saturating_add(header.capacity().unwrap_or(GRANULE));
        let available = end - pointer;
        if size > available && !header.is_reserved() {
            debug!(
                "Free of {} bytes at {} overruns its block by {} bytes.",
                size,
                pointer,
                size - available
            );
        }

        self.release(address, header);
        Ok(())
    }

    /// Scrub the payload and clear `USED`. Free space never holds old payload
    /// bytes.
    fn release(&mut self, address: VirtualAddress, mut header: BlockHeader) {
        if header.is_reserved() {
            trace!("Ignored free of reserved block {}.", address);
            return;
        }

        let payload = header.capacity().unwrap_or(GRANULE) - HEADER_SIZE;
        self.arena.fill(address + HEADER_SIZE, payload, SCRUB_BYTE);
        header.release();
        self.arena.set_header(address, &header);
        self.validate();

        trace!("Freed block {}.", address);
    }

    fn resolve(&self, pointer: VirtualAddress) -> Result<VirtualAddress, HeapError> {
        match self.find_block(pointer) {
            Some(address) => Ok(address),
            None => {
                debug!("Free of foreign pointer {}.", pointer);
                Err(HeapError::ForeignPointer)
            }
        }
    }

    /// A real pointer to the byte at `address`.
    pub fn pointer(&mut self, address: VirtualAddress) -> Option<*mut u8> {
        self.arena.pointer(address)
    }

    /// The heap address of a real pointer.
    pub fn address(&self, pointer: *const u8) -> Option<VirtualAddress> {
        self.arena.address(pointer)
    }

    #[inline]
    fn validate(&self) {
        #[cfg(any(test, feature = "heap_validation"))]
        {
            let mut allocated = 0;
            for (address, header) in self.blocks() {
                let capacity = header.capacity().expect("Allocated header must be valid.");
                assert!(
                    address.is_aligned(GRANULE),
                    "Block {} is not granule aligned.",
                    address
                );
                assert!(
                    self.region.contains_span(address, capacity),
                    "Block {} overruns the heap region {}.",
                    address,
                    self.region
                );
                allocated += capacity;
            }
            assert!(
                allocated <= self.region.size(),
                "Allocated bytes exceed the heap region."
            );
        }
    }
}

/// Iterator over the allocated blocks of a [BlockAllocator](BlockAllocator).
pub struct Blocks<'h, 'a> {
    heap: &'h BlockAllocator<'a>,
    next: Option<VirtualAddress>,
}

impl Iterator for Blocks<'_, '_> {
    type Item = (VirtualAddress, BlockHeader);

    fn next(&mut self) -> Option<(VirtualAddress, BlockHeader)> {
        let mut address = self.next.take()?;
        while self.heap.region.contains_span(address, HEADER_SIZE) {
            match self.heap.allocated_header(address) {
                Some(header) => {
                    self.next = header.capacity().and_then(|c| address.checked_add(c));
                    return Some((address, header));
                }
                None => address = address.checked_add(GRANULE)?,
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::{BlockAllocator, SCRUB_BYTE};
    use crate::mem::heap::arena::Arena;
    use crate::mem::heap::header::{BlockFlags, BlockHeader, SizeClass, GRANULE, HEADER_SIZE};
    use crate::mem::heap::HeapError;
    use crate::mem::{AddressRegion, VirtualAddress};

    const BASE: VirtualAddress = VirtualAddress::new(0x4000);
    const SIZE: usize = 16 * GRANULE;

    fn with_heap<R>(f: impl FnOnce(&mut BlockAllocator) -> R) -> R {
        let mut backing = vec![0u8; SIZE];
        let region = AddressRegion::new(BASE, BASE + SIZE).unwrap();
        let mut heap = BlockAllocator::new(Arena::with_base(BASE, &mut backing), region).unwrap();
        f(&mut heap)
    }

    #[test]
    fn first_fit() {
        with_heap(|heap| {
            let a = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            let b = heap.allocate_block(100, BlockFlags::DATA).unwrap();
            let c = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            assert_eq!(a, BASE + HEADER_SIZE);
            assert_eq!(b, BASE + GRANULE + HEADER_SIZE);
            assert_eq!(c, BASE + 3 * GRANULE + HEADER_SIZE);
            assert_eq!(heap.allocated_blocks(), 3);
            assert_eq!(heap.allocated_bytes(), 4 * GRANULE);
        });
    }

    #[test]
    fn skips_runs_that_are_too_short() {
        with_heap(|heap| {
            let a = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            let _b = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            heap.free_block(a).unwrap();

            // One free granule in front, then an allocated one: a two granule
            // block has to go after both.
            let c = heap.allocate_block(100, BlockFlags::DATA).unwrap();
            assert_eq!(c, BASE + 2 * GRANULE + HEADER_SIZE);

            // The hole is still there for a small one.
            let d = heap.allocate_block(1, BlockFlags::DATA).unwrap();
            assert_eq!(d, a);
        });
    }

    #[test]
    fn find_allocated() {
        with_heap(|heap| {
            assert_eq!(heap.find_allocated_block(BASE), None);
            heap.allocate_block(16, BlockFlags::DATA).unwrap();
            let b = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            assert_eq!(heap.find_allocated_block(VirtualAddress::new(0)), Some(BASE));
            assert_eq!(heap.find_allocated_block(BASE + 1), Some(BASE + GRANULE));
            heap.free_block(b).unwrap();
            assert_eq!(heap.find_allocated_block(BASE + 1), None);
        });
    }

    #[test]
    fn find_available() {
        with_heap(|heap| {
            assert_eq!(heap.find_available_block(BASE, 0), None);
            assert_eq!(heap.find_available_block(BASE, SIZE), None);
            assert_eq!(heap.find_available_block(BASE, SIZE - HEADER_SIZE), Some(BASE));
            assert_eq!(heap.find_available_block(BASE + 1, 16), Some(BASE + GRANULE));
            assert_eq!(heap.find_available_block(BASE + 8 * GRANULE, 8 * GRANULE - HEADER_SIZE), Some(BASE + 8 * GRANULE));
            assert_eq!(heap.find_available_block(BASE + 9 * GRANULE, 8 * GRANULE - HEADER_SIZE), None);
        });
    }

    #[test]
    fn find_block() {
        with_heap(|heap| {
            let a = heap.allocate_block(200, BlockFlags::DATA).unwrap();
            let header = BASE;
            assert_eq!(heap.find_block(a), Some(header));
            assert_eq!(heap.find_block(a + 199), Some(header));
            assert_eq!(heap.find_block(BASE + (4 * GRANULE - 1)), Some(header));
            assert_eq!(heap.find_block(BASE + 4 * GRANULE), None);
            assert_eq!(heap.find_block(header), None);
            assert_eq!(heap.find_block(VirtualAddress::new(0x10)), None);
        });
    }

    #[test]
    fn zero_size() {
        with_heap(|heap| {
            assert_eq!(heap.allocate_block(0, BlockFlags::DATA), Err(HeapError::ZeroSizeRequest));
            assert_eq!(heap.allocate_block(0, BlockFlags::CODE), Err(HeapError::ZeroSizeRequest));
            assert_eq!(heap.allocated_blocks(), 0);
        });
    }

    #[test]
    fn out_of_memory() {
        with_heap(|heap| {
            while heap.allocate_block(60, BlockFlags::DATA).is_ok() {}
            assert_eq!(heap.allocated_blocks(), 16);
            assert_eq!(heap.allocated_bytes(), SIZE);
            assert_eq!(heap.allocate_block(1, BlockFlags::DATA), Err(HeapError::OutOfMemory));
            assert_eq!(heap.allocate_block(usize::MAX, BlockFlags::DATA), Err(HeapError::OutOfMemory));
        });
    }

    #[test]
    fn freed_space_is_reused() {
        with_heap(|heap| {
            let a = heap.allocate_block(100, BlockFlags::CODE).unwrap();
            let used = heap.allocated_bytes();
            heap.free_block(a).unwrap();
            assert_eq!(heap.allocated_bytes(), 0);
            let b = heap.allocate_block(100, BlockFlags::CODE).unwrap();
            assert_eq!(a, b);
            assert_eq!(heap.allocated_bytes(), used);
        });
    }

    #[test]
    fn reserved_blocks_stay() {
        with_heap(|heap| {
            let a = heap.allocate_block(16, BlockFlags::RESERVED | BlockFlags::DATA).unwrap();
            let header = heap.find_block(a).unwrap();
            let before = heap.header(header).unwrap();

            assert_eq!(heap.free_block(a), Ok(()));
            assert_eq!(heap.free_block_sized(a, 16), Ok(()));
            assert_eq!(heap.free_header(header), Ok(()));

            assert_eq!(heap.header(header), Some(before));
            assert!(before.is_allocated());
            assert!(before.is_reserved());
            assert_eq!(heap.allocated_blocks(), 1);
        });
    }

    #[test]
    fn foreign_pointers() {
        with_heap(|heap| {
            let a = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            assert_eq!(heap.free_block(BASE + 5 * GRANULE), Err(HeapError::ForeignPointer));
            assert_eq!(heap.free_block(VirtualAddress::new(0xdead_0000)), Err(HeapError::ForeignPointer));
            assert_eq!(heap.free_header(BASE + GRANULE), Err(HeapError::ForeignPointer));
            heap.free_block(a).unwrap();
            assert_eq!(heap.free_block(a), Err(HeapError::ForeignPointer));
        });
    }

    #[test]
    fn sized_free_scrubs() {
        let mut backing = vec![0u8; SIZE];
        let region = AddressRegion::new(BASE, BASE + SIZE).unwrap();
        let mut heap = BlockAllocator::new(Arena::with_base(BASE, &mut backing), region).unwrap();

        let a = heap.allocate_block(16, BlockFlags::DATA).unwrap();
        let ptr = heap.pointer(a).unwrap();
        unsafe { ptr.write_bytes(0x5A, 60) };

        // Claiming more than the block holds only scrubs up to its end.
        heap.free_block_sized(a, 4096).unwrap();
        assert_eq!(heap.allocated_blocks(), 0);
        drop(heap);

        assert!(backing[HEADER_SIZE..GRANULE].iter().all(|b| *b == SCRUB_BYTE));
        assert_eq!(BlockHeader::decode([backing[0], backing[1], backing[2], backing[3]]).flags(), BlockFlags::DATA);
    }

    #[test]
    fn unsized_free_scrubs_the_payload() {
        let mut backing = vec![0u8; SIZE];
        let region = AddressRegion::new(BASE, BASE + SIZE).unwrap();
        let mut heap = BlockAllocator::new(Arena::with_base(BASE, &mut backing), region).unwrap();

        let a = heap.allocate_block(100, BlockFlags::DATA).unwrap();
        let _b = heap.allocate_block(16, BlockFlags::DATA).unwrap();
        let ptr = heap.pointer(a).unwrap();
        unsafe { ptr.write_bytes(0x5A, 2 * GRANULE - HEADER_SIZE) };
        heap.free_block(a).unwrap();
        drop(heap);

        assert!(backing[HEADER_SIZE..2 * GRANULE].iter().all(|b| *b == SCRUB_BYTE));
        // The next block's header is untouched.
        assert!(BlockHeader::decode([backing[128], backing[129], backing[130], backing[131]]).is_allocated());
    }

    // Write `header` into the payload of a live block.
    fn forge(heap: &mut BlockAllocator, address: VirtualAddress, header: BlockHeader) {
        let ptr = heap.pointer(address).unwrap();
        let bytes = header.encode();
        unsafe { ptr.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len()) };
    }

    #[test]
    fn payload_lookalikes_do_not_survive_free() {
        with_heap(|heap| {
            let a = heap.allocate_block(100, BlockFlags::DATA).unwrap();
            let lookalike = BlockHeader::allocated(BlockFlags::DATA, SizeClass::new(0).unwrap());
            forge(heap, BASE + GRANULE, lookalike);

            heap.free_block(a).unwrap();
            assert_eq!(heap.allocated_bytes(), 0);
            assert_eq!(heap.allocated_blocks(), 0);

            let b = heap.allocate_block(100, BlockFlags::CODE).unwrap();
            forge(heap, BASE + GRANULE, lookalike);
            heap.free_header(BASE).unwrap();
            assert_eq!(heap.allocated_blocks(), 0);
            assert_eq!(heap.find_block(b), None);
        });
    }

    #[test]
    fn searches_never_start_inside_a_block() {
        with_heap(|heap| {
            let a = heap.allocate_block(200, BlockFlags::DATA).unwrap();
            let lookalike = BlockHeader::allocated(BlockFlags::DATA, SizeClass::new(0).unwrap());
            forge(heap, BASE + GRANULE, lookalike);

            assert_eq!(heap.find_available_block(BASE + 1, 16), Some(BASE + 4 * GRANULE));
            assert_eq!(heap.find_available_block(a, 16), Some(BASE + 4 * GRANULE));
            assert_eq!(heap.find_allocated_block(BASE + 1), None);
            assert_eq!(heap.find_allocated_block(BASE + 2 * GRANULE), None);
            assert_eq!(heap.find_allocated_block(BASE), Some(BASE));

            let b = heap.allocate_block(16, BlockFlags::DATA).unwrap();
            assert_eq!(b, BASE + 4 * GRANULE + HEADER_SIZE);
            assert_eq!(heap.find_allocated_block(BASE + 1), Some(BASE + 4 * GRANULE));
            assert_eq!(heap.find_available_block(BASE + 2 * GRANULE, 16), Some(BASE + 5 * GRANULE));
            assert_eq!(heap.allocated_blocks(), 2);
        });
    }

    #[test]
    fn unrecognized_headers_are_free_space() {
        let mut backing = vec![0xFFu8; SIZE];
        let region = AddressRegion::new(BASE, BASE + SIZE).unwrap();
        let mut heap = BlockAllocator::new(Arena::with_base(BASE, &mut backing), region).unwrap();

        assert_eq!(heap.allocated_blocks(), 0);
        let a = heap.allocate_block(16, BlockFlags::DATA).unwrap();
        assert_eq!(a, BASE + HEADER_SIZE);
    }

    #[test]
    fn region_reconfiguration() {
        with_heap(|heap| {
            let a = heap.allocate_block(100, BlockFlags::DATA).unwrap();
            let original = heap.region();

            // Inverted.
            assert_eq!(heap.set_region(BASE + GRANULE, BASE), Err(HeapError::InvalidRegion));
            // Smaller than what is allocated.
            assert_eq!(heap.set_region(BASE, BASE + GRANULE), Err(HeapError::InvalidRegion));
            // Would orphan the live block.
            assert_eq!(heap.set_region(BASE + 4 * GRANULE, BASE + SIZE), Err(HeapError::InvalidRegion));
            // Unaligned.
            assert_eq!(heap.set_region(BASE + 1, BASE + SIZE), Err(HeapError::InvalidRegion));
            // Outside the arena.
            assert_eq!(heap.set_region(BASE, BASE + SIZE + GRANULE), Err(HeapError::InvalidRegion));
            assert_eq!(heap.region(), original);

            assert_eq!(heap.set_region(BASE, BASE + 2 * GRANULE), Ok(()));
            assert_eq!(heap.allocate_block(1, BlockFlags::DATA), Err(HeapError::OutOfMemory));

            heap.free_block(a).unwrap();
            assert_eq!(heap.set_region(BASE + 8 * GRANULE, BASE + SIZE), Ok(()));
            let b = heap.allocate_block(1, BlockFlags::DATA).unwrap();
            assert_eq!(b, BASE + 8 * GRANULE + HEADER_SIZE);
            assert_eq!(heap.find_block(a), None);
        });
    }

    #[test]
    fn largest_block() {
        with_heap(|heap| {
            let a = heap.allocate_block(SIZE - HEADER_SIZE, BlockFlags::DATA).unwrap();
            assert_eq!(heap.allocated_bytes(), SIZE);
            assert_eq!(heap.header(BASE).and_then(|h| h.size_class()), SizeClass::new(4));
            assert_eq!(heap.find_block(a + (SIZE - HEADER_SIZE - 1)), Some(BASE));
        });
    }
}
