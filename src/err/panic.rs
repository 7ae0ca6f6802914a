//! The panic handler

use core::panic::PanicInfo;

use log_crate::error;

use crate::consts;
use crate::util::halt_loop;

/// The panic handler. Prints diagnostics and halts.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("Kernel panic: {}.", info);
    error!("{} {} halted.", consts::NAME, consts::VERSION);

    halt_loop();
}
