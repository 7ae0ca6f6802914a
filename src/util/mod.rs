use core::arch::asm;

pub mod sync;

/// Halt the processor forever.
pub fn halt_loop() -> ! {
    loop {
        unsafe { asm!("hlt", options(nomem, nostack)) };
    }
}
