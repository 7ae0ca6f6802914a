// Logging facilities. All log output is printed to all enabled logging sinks.

use core::fmt;

mod logger;
#[cfg(feature = "log_serial")]
mod serial;
#[cfg(feature = "log_vga")]
mod vga_text;

/// A VGA color code. The serial sink maps these to ANSI colors.
#[allow(dead_code)]
#[derive(Copy, Clone)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    #[cfg(feature = "log_vga")]
    vga_text::_print(args);
    #[cfg(feature = "log_serial")]
    serial::_print(args);
}

#[doc(hidden)]
pub fn _print_colored(color: Color, args: fmt::Arguments) {
    #[cfg(feature = "log_vga")]
    vga_text::_print_colored(color, args);
    #[cfg(feature = "log_serial")]
    serial::_print_colored(color, args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::io::log::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! print_colored {
    ($color:expr, $($arg:tt)*) => ($crate::io::log::_print_colored($color, format_args!($($arg)*)));
}

pub fn init() {
    #[cfg(feature = "log_vga")]
    vga_text::init();
    #[cfg(feature = "log_serial")]
    serial::init();
    logger::init();
}
