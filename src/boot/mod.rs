/*!

# System initialization.

Architecture-specific submodules define the entry point `kboot`, which locates
the heap window and then calls [kmain](kmain).

!*/

mod arch;

use log_crate::{info, warn};

use crate::consts;
use crate::mem::heap::{Arena, BlockAllocator, HeapError, KernelHeap, ALLOCATOR};
use crate::mem::raw;
use crate::util::halt_loop;

/// Architecture-independent kernel entry point. `window` is the zeroed heap
/// memory right after the kernel image.
fn kmain(window: &'static mut [u8]) -> ! {
    info!("kmain.");

    info!("This is {}, version {}.", consts::NAME, consts::VERSION);

    let arena = Arena::from_slice(window);
    let region = arena.span();
    let heap = match BlockAllocator::new(arena, region) {
        Ok(heap) => ALLOCATOR.install(KernelHeap::new(heap)),
        Err(e) => panic!("Failed to set up the kernel heap on {}: {}", region, e),
    };
    info!("INITIALIZED kernel heap on {}.", region);

    if let Err(e) = smoke_test(heap) {
        panic!("Heap smoke test failed: {}", e);
    }

    let usage = heap.usage();
    info!(
        "Heap usage: {} bytes in {} blocks out of {}.",
        usage.bytes,
        usage.blocks,
        usage.region.size()
    );

    halt_loop();
}

const FIRST: &[u8] = b"Hello, world!";
const SECOND: &[u8] = b"OSMOS heap ok.";

/// Allocate two 16-byte strings, print them, release both and allocate again.
/// The reallocation is expected to land where the first string was.
fn smoke_test(heap: &KernelHeap) -> Result<(), HeapError> {
    let layout = core::alloc::Layout::array::<u8>(16).map_err(|_| HeapError::OutOfMemory)?;

    let first = heap.new_array(layout);
    let second = heap.new_array(layout);
    if first.is_null() || second.is_null() {
        heap.delete(first);
        heap.delete(second);
        return Err(HeapError::OutOfMemory);
    }

    for (ptr, text) in [(first, FIRST), (second, SECOND)] {
        let shown = unsafe {
            raw::copy(ptr, text.as_ptr(), text.len());
            core::slice::from_raw_parts(ptr, text.len())
        };
        info!("{:p}: {}", ptr, core::str::from_utf8(shown).unwrap_or("?"));
    }

    heap.delete_sized(first, layout.size());
    heap.delete_sized(second, layout.size());

    let again = heap.new_array(layout);
    if again.is_null() {
        return Err(HeapError::OutOfMemory);
    }
    if again != first {
        warn!("Reallocation moved from {:p} to {:p}.", first, again);
    }
    heap.delete(again);

    Ok(())
}
