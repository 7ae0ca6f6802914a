//! x86 I/O ports.

use core::arch::asm;
use core::marker::PhantomData;

/// A port in the x86 I/O address space, accessed `S` bits at a time.
pub struct Port<S> {
    address: u16,
    width: PhantomData<S>,
}

impl<S> Port<S> {
    pub const fn new(address: u16) -> Port<S> {
        Port {
            address,
            width: PhantomData,
        }
    }
}

impl Port<u8> {
    /// Send `value` to the device behind the port.
    /// # Safety
    /// The effect depends entirely on the device. The caller must know what
    /// the write does to it.
    pub unsafe fn write(&mut self, value: u8) {
        asm!("out dx, al", in("dx") self.address, in("al") value, options(nostack, nomem, preserves_flags));
    }

    /// Fetch a byte from the device behind the port.
    /// # Safety
    /// Reads may have side effects on the device, such as popping a FIFO.
    pub unsafe fn read(&mut self) -> u8 {
        let value: u8;
        asm!("in al, dx", out("al") value, in("dx") self.address, options(nostack, nomem, preserves_flags));
        value
    }
}
