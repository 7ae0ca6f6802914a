//! Spinlocks.

use core::cell::UnsafeCell;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Data behind a test-and-test-and-set spinlock.
pub struct Spinlock<T> {
    held: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

/// Access to the data of a held [Spinlock](Spinlock). Dropping it releases
/// the lock.
pub struct SpinlockGuard<'a, T> {
    owner: &'a Spinlock<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Spinlock<T> {
        Spinlock {
            held: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    fn acquire(&self, weak: bool) -> bool {
        let exchanged = if weak {
            self.held
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
        } else {
            self.held
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        };
        exchanged.is_ok()
    }

    /// Spin until the lock is ours.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        while !self.acquire(true) {
            while self.held.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        SpinlockGuard { owner: self }
    }

    /// Take the lock only if it is free. On a single core a held lock can
    /// only mean reentrancy, which would otherwise spin forever.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        if self.acquire(false) {
            Some(SpinlockGuard { owner: self })
        } else {
            None
        }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.owner.held.store(false, Ordering::Release);
    }
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.owner.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.owner.data.get() }
    }
}
