//! Unchecked fill and copy primitives over raw memory.
//!
//! These work at byte, word, dword and qword granularity. Sizes are always
//! given in bytes; a trailing remainder smaller than one unit is left as is.
//! Nothing here checks bounds: the caller owns that responsibility.

use core::mem::size_of;

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// A unit of raw memory access: `u8`, `u16`, `u32` or `u64`.
pub trait Unit: Copy + private::Sealed {}

impl Unit for u8 {}
impl Unit for u16 {}
impl Unit for u32 {}
impl Unit for u64 {}

/// Fill `size` bytes starting at `ptr` with repetitions of `value`.
/// # Safety
/// `[ptr, ptr + size)` must be valid for writes. No alignment is required.
pub unsafe fn fill<T: Unit>(ptr: *mut T, size: usize, value: T) {
    for i in 0..size / size_of::<T>() {
        ptr.add(i).write_unaligned(value);
    }
}

/// Copy `size` bytes from `source` to `target`, front to back.
/// # Safety
/// `[source, source + size)` must be valid for reads and
/// `[target, target + size)` valid for writes. Overlap is only allowed when
/// `target` is below `source`.
pub unsafe fn copy<T: Unit>(target: *mut T, source: *const T, size: usize) {
    for i in 0..size / size_of::<T>() {
        target.add(i).write_unaligned(source.add(i).read_unaligned());
    }
}
