//! The kernel heap.
//!
//! The heap manages a window of memory right after the kernel image as a
//! sequence of header-prefixed, power-of-two sized blocks. See
//! [block](block) for the allocation strategy and [header](header) for the
//! block metadata. Kernel code allocates through [KernelHeap](KernelHeap),
//! usually by way of the Rust global allocator.

mod arena;
mod binding;
mod block;
mod header;

use core::alloc::{GlobalAlloc, Layout};
use core::fmt::{self, Display, Formatter};
use core::ptr;

use crate::util::sync::OnceCell;

pub use arena::Arena;
pub use binding::{HeapUsage, KernelHeap};
pub use block::{BlockAllocator, Blocks, SCRUB_BYTE};
pub use header::{BlockFlags, BlockHeader, SizeClass, GRANULE, HEADER_SIZE, MAGIC};

/// Why a heap operation did not happen.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// No free run in the region is large enough.
    OutOfMemory,
    /// A region reconfiguration would break the heap's invariants.
    InvalidRegion,
    /// The pointer does not belong to a live allocation.
    ForeignPointer,
    /// Zero bytes were requested.
    ZeroSizeRequest,
}

impl Display for HeapError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let msg = match self {
            HeapError::OutOfMemory => "out of heap memory",
            HeapError::InvalidRegion => "invalid heap region",
            HeapError::ForeignPointer => "pointer is not owned by the heap",
            HeapError::ZeroSizeRequest => "zero-sized heap request",
        };
        f.write_str(msg)
    }
}

/// The heap as seen by `alloc`. Stays empty, failing every allocation, until
/// boot [installs](GlobalHeap::install) the kernel heap.
pub struct GlobalHeap(OnceCell<KernelHeap<'static>>);

impl GlobalHeap {
    pub const fn new() -> GlobalHeap {
        GlobalHeap(OnceCell::new())
    }

    /// Make `heap` back all further global allocations. Panics if a heap was
    /// already installed.
    pub fn install(&self, heap: KernelHeap<'static>) -> &KernelHeap<'static> {
        self.0.init(heap);
        &self.0
    }

    /// The installed heap.
    pub fn get(&self) -> Option<&KernelHeap<'static>> {
        self.0.get()
    }
}

unsafe impl GlobalAlloc for GlobalHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.get() {
            Some(heap) => heap.new_object(layout),
            None => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(heap) = self.get() {
            heap.delete_sized(ptr, layout.size());
        }
    }
}

/// The global heap allocator.
#[cfg_attr(not(test), global_allocator)]
pub static ALLOCATOR: GlobalHeap = GlobalHeap::new();
