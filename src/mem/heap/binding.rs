//! Construction and destruction hooks.
//!
//! This is the only surface the rest of the kernel allocates through. It tags
//! requests and translates between pointers and heap addresses; everything
//! else is up to the [BlockAllocator](BlockAllocator).

use core::alloc::Layout;
use core::ptr;

use super::block::BlockAllocator;
use super::header::{BlockFlags, HEADER_SIZE};
use crate::mem::{align_up, AddressRegion};
use crate::util::sync::Spinlock;

/// A snapshot of heap occupation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeapUsage {
    pub region: AddressRegion,
    /// Bytes taken by allocated blocks, headers included.
    pub bytes: usize,
    pub blocks: usize,
}

/// The kernel heap.
pub struct KernelHeap<'a> {
    inner: Spinlock<BlockAllocator<'a>>,
}

impl<'a> KernelHeap<'a> {
    pub const fn new(heap: BlockAllocator<'a>) -> KernelHeap<'a> {
        KernelHeap {
            inner: Spinlock::new(heap),
        }
    }

    /// Allocate memory for a single object. Null on failure.
    pub fn new_object(&self, layout: Layout) -> *mut u8 {
        self.construct(layout, BlockFlags::CODE)
    }

    /// Allocate memory for an array. `layout` covers the whole array. Null on
    /// failure.
    pub fn new_array(&self, layout: Layout) -> *mut u8 {
        self.construct(layout, BlockFlags::DATA)
    }

    /// Release the allocation containing `ptr`. Pointers the heap does not
    /// own are ignored.
    pub fn delete(&self, ptr: *mut u8) {
        let mut heap = match self.inner.try_lock() {
            Some(heap) => heap,
            None => return,
        };
        if let Some(address) = heap.address(ptr) {
            let _ = heap.free_block(address);
        }
    }

    /// Release the allocation containing `ptr`, which the caller used for
    /// `size` bytes. Pointers the heap does not own are ignored.
    pub fn delete_sized(&self, ptr: *mut u8, size: usize) {
        let mut heap = match self.inner.try_lock() {
            Some(heap) => heap,
            None => return,
        };
        if let Some(address) = heap.address(ptr) {
            let _ = heap.free_block_sized(address, size);
        }
    }

    pub fn usage(&self) -> HeapUsage {
        let heap = self.inner.lock();
        HeapUsage {
            region: heap.region(),
            bytes: heap.allocated_bytes(),
            blocks: heap.allocated_blocks(),
        }
    }

    fn construct(&self, layout: Layout, flags: BlockFlags) -> *mut u8 {
        // Payloads are only guaranteed to be aligned to the header size, so
        // stricter layouts get slack to align within the payload.
        let slack = if layout.align() > HEADER_SIZE {
            layout.align() - 1
        } else {
            0
        };
        let size = match layout.size().checked_add(slack) {
            Some(size) => size,
            None => return ptr::null_mut(),
        };

        let mut heap = match self.inner.try_lock() {
            Some(heap) => heap,
            None => return ptr::null_mut(),
        };
        let payload = match heap.allocate_block(size, flags) {
            Ok(payload) => payload,
            Err(_) => return ptr::null_mut(),
        };
        let padding = heap.pointer(payload).and_then(|base| {
            let padding = align_up(base as usize, layout.align())? - base as usize;
            Some((base, padding))
        });
        match padding {
            Some((base, padding)) if padding <= slack => base.wrapping_add(padding),
            _ => {
                let _ = heap.free_block(payload);
                ptr::null_mut()
            }
        }
    }
}
