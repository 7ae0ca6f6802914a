//! Logging to the first serial port.

use core::fmt::{self, Write};

use ansi_rgb::Foreground;
use rgb::RGB8;

use super::Color;
use crate::io::port::Port;
use crate::util::sync::Spinlock;

/// A 16550 UART.
struct SerialPort {
    base: u16,
}

impl SerialPort {
    /// COM1.
    const COM1: u16 = 0x3F8;

    /// Line status: transmitter holding register empty.
    const LSR_THRE: u8 = 0x20;

    const fn new(base: u16) -> SerialPort {
        SerialPort { base }
    }

    fn the() -> &'static Spinlock<SerialPort> {
        static SERIAL_PORT: Spinlock<SerialPort> = Spinlock::new(SerialPort::new(SerialPort::COM1));
        &SERIAL_PORT
    }

    fn register(&self, offset: u16) -> Port<u8> {
        Port::new(self.base + offset)
    }

    /// Program the UART for 38400 baud, 8N1, FIFOs on.
    fn init(&mut self) {
        let sequence: [(u16, u8); 7] = [
            (1, 0x00), // interrupts off
            (3, 0x80), // DLAB on
            (0, 0x03), // divisor low byte: 38400 baud
            (1, 0x00), // divisor high byte
            (3, 0x03), // 8 bits, no parity, one stop bit
            (2, 0xC7), // FIFO on, cleared, 14-byte threshold
            (4, 0x0B), // IRQs on, RTS/DSR set
        ];
        for (offset, value) in sequence {
            unsafe { self.register(offset).write(value) };
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut status = self.register(5);
        while unsafe { status.read() } & SerialPort::LSR_THRE == 0 {
            core::hint::spin_loop();
        }
        unsafe { self.register(0).write(byte) };
    }
}

impl Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

impl From<Color> for RGB8 {
    fn from(color: Color) -> RGB8 {
        let (r, g, b) = match color {
            Color::Black => (0x00, 0x00, 0x00),
            Color::Blue => (0x00, 0x00, 0xAA),
            Color::Green => (0x00, 0xAA, 0x00),
            Color::Cyan => (0x00, 0xAA, 0xAA),
            Color::Red => (0xAA, 0x00, 0x00),
            Color::Magenta => (0xAA, 0x00, 0xAA),
            Color::Brown => (0xAA, 0x55, 0x00),
            Color::LightGray => (0xAA, 0xAA, 0xAA),
            Color::DarkGray => (0x55, 0x55, 0x55),
            Color::LightBlue => (0x55, 0x55, 0xFF),
            Color::LightGreen => (0x55, 0xFF, 0x55),
            Color::LightCyan => (0x55, 0xFF, 0xFF),
            Color::LightRed => (0xFF, 0x55, 0x55),
            Color::Pink => (0xFF, 0x55, 0xFF),
            Color::Yellow => (0xFF, 0xFF, 0x55),
            Color::White => (0xFF, 0xFF, 0xFF),
        };
        RGB8::new(r, g, b)
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let _ = SerialPort::the().lock().write_fmt(args);
}

#[doc(hidden)]
pub fn _print_colored(color: Color, args: fmt::Arguments) {
    let _ = write!(SerialPort::the().lock(), "{}", args.fg(color.into()));
}

/// Initialize COM1.
pub fn init() {
    SerialPort::the().lock().init();
}
