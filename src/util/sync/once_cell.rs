//! Single-initialization storage.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ops::Deref;
use core::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
enum CellState {
    Empty = 0,
    Initializing = 1,
    Ready = 2,
}

/// A storage location which can be initialized once at runtime.
pub struct OnceCell<T> {
    inner: UnsafeCell<MaybeUninit<T>>,
    state: AtomicU8,
}

unsafe impl<T: Send> Send for OnceCell<T> {}
unsafe impl<T: Send + Sync> Sync for OnceCell<T> {}

impl<T> OnceCell<T> {
    /// Create an empty cell.
    pub const fn new() -> OnceCell<T> {
        OnceCell {
            inner: UnsafeCell::new(MaybeUninit::uninit()),
            state: AtomicU8::new(CellState::Empty as u8),
        }
    }

    /// Initialize the cell. Panics if double-initialized.
    pub fn init(&self, data: T) {
        if self
            .state
            .compare_exchange(
                CellState::Empty as u8,
                CellState::Initializing as u8,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            panic!("Tried to double-initialize OnceCell.");
        }

        unsafe { (*self.inner.get()).write(data) };

        self.state.store(CellState::Ready as u8, Ordering::Release);
    }

    /// Get a reference to the contents, if initialization has already occurred.
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == CellState::Ready as u8 {
            Some(unsafe { (*self.inner.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

impl<T> Deref for OnceCell<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
            .expect("Tried to dereference an uninitialized OnceCell.")
    }
}

impl<T> Drop for OnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == CellState::Ready as u8 {
            unsafe { self.inner.get_mut().assume_init_drop() };
        }
    }
}
