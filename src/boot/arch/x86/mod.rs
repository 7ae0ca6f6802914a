#[cfg(not(test))]
use log_crate::{info, warn};

#[cfg(not(test))]
use crate::{
    boot, consts,
    io::log,
    mem::{align_up, heap::GRANULE, raw},
};

#[cfg(not(test))]
extern "C" {
    /// End of the loaded kernel image, provided by the linker script.
    static _eof: u8;
}

/// Entry point, called by the Multiboot2 assembly stub with the bootloader
/// magic and the boot information table address.
#[cfg(not(test))]
#[no_mangle]
pub extern "C" fn kboot(magic: u32, table_address: usize) -> ! {
    log::init();

    info!("kboot.");
    if magic != consts::MULTIBOOT2_BOOTLOADER_MAGIC {
        warn!("Unexpected bootloader magic {:#010x}.", magic);
    }
    info!("Boot information table at {:#x}.", table_address);

    let eof = unsafe { &_eof as *const u8 as usize };
    let lower = match align_up(eof, GRANULE) {
        Some(lower) => lower,
        None => panic!("No room for a heap after the kernel image."),
    };

    let window = unsafe {
        raw::fill(lower as *mut u32, consts::KERNEL_HEAP_SIZE, 0);
        core::slice::from_raw_parts_mut(lower as *mut u8, consts::KERNEL_HEAP_SIZE)
    };

    boot::kmain(window);
}
