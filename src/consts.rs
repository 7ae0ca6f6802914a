// Global constants.

use crate::mem::size;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("GIT_HASH"));

/// Size of the kernel heap window, placed right after the loaded kernel image.
pub const KERNEL_HEAP_SIZE: usize = 128 * size::KB;

/// Magic value handed over in `eax` by a Multiboot2 compliant bootloader.
pub const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36D7_6289;
