//! Logging to the VGA text mode screen.
//!
//! Text runs top to bottom from the upper left corner. Once the cursor is on
//! the last row, every new line scrolls the screen up by one.

use core::fmt::{self, Write};
use core::ptr;

use super::Color;
use crate::util::sync::{OnceCell, Spinlock};

const ROWS: usize = 25;
const COLUMNS: usize = 80;

/// Shown for bytes outside printable ASCII.
const REPLACEMENT: u8 = 0xFE;

/// Attribute byte: background in the high nibble, foreground in the low.
#[derive(Copy, Clone, PartialEq, Eq)]
struct Attribute(u8);

impl Attribute {
    const fn new(fg: Color, bg: Color) -> Attribute {
        Attribute((bg as u8) << 4 | (fg as u8))
    }

    const fn with_foreground(self, fg: Color) -> Attribute {
        Attribute(self.0 & 0xF0 | fg as u8)
    }

    /// The 16-bit cell holding `character` in this attribute.
    const fn cell(self, character: u8) -> u16 {
        (self.0 as u16) << 8 | character as u16
    }
}

/// The memory-mapped text buffer.
struct TextBuffer(*mut u16);

// Only ever reached through the writer's lock.
unsafe impl Send for TextBuffer {}

impl TextBuffer {
    const ADDRESS: usize = 0xB8000;

    fn index(row: usize, column: usize) -> Option<usize> {
        if row < ROWS && column < COLUMNS {
            Some(row * COLUMNS + column)
        } else {
            None
        }
    }

    fn put(&mut self, row: usize, column: usize, cell: u16) {
        if let Some(index) = TextBuffer::index(row, column) {
            unsafe { ptr::write_volatile(self.0.add(index), cell) };
        }
    }

    fn get(&self, row: usize, column: usize) -> u16 {
        match TextBuffer::index(row, column) {
            Some(index) => unsafe { ptr::read_volatile(self.0.add(index)) },
            None => 0,
        }
    }
}

struct ScreenWriter {
    row: usize,
    column: usize,
    attribute: Attribute,
    default_attribute: Attribute,
    buffer: TextBuffer,
}

static SCREEN_WRITER: OnceCell<Spinlock<ScreenWriter>> = OnceCell::new();

impl ScreenWriter {
    fn new(fg: Color, bg: Color) -> ScreenWriter {
        let attribute = Attribute::new(fg, bg);
        ScreenWriter {
            row: 0,
            column: 0,
            attribute,
            default_attribute: attribute,
            buffer: TextBuffer(TextBuffer::ADDRESS as *mut u16),
        }
    }

    fn blank_row(&mut self, row: usize) {
        let blank = self.default_attribute.cell(b' ');
        for column in 0..COLUMNS {
            self.buffer.put(row, column, blank);
        }
    }

    fn clear(&mut self) {
        for row in 0..ROWS {
            self.blank_row(row);
        }
        self.row = 0;
        self.column = 0;
    }

    fn new_line(&mut self) {
        self.column = 0;
        if self.row + 1 < ROWS {
            self.row += 1;
            return;
        }

        for row in 1..ROWS {
            for column in 0..COLUMNS {
                let cell = self.buffer.get(row, column);
                self.buffer.put(row - 1, column, cell);
            }
        }
        self.blank_row(ROWS - 1);
    }

    fn put_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            b'\r' => self.column = 0,
            _ => {
                if self.column == COLUMNS {
                    self.new_line();
                }
                let character = if (0x20..0x7F).contains(&byte) {
                    byte
                } else {
                    REPLACEMENT
                };
                let cell = self.attribute.cell(character);
                self.buffer.put(self.row, self.column, cell);
                self.column += 1;
            }
        }
    }
}

impl Write for ScreenWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().for_each(|b| self.put_byte(b));
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(writer) = SCREEN_WRITER.get() {
        let _ = writer.lock().write_fmt(args);
    }
}

#[doc(hidden)]
pub fn _print_colored(color: Color, args: fmt::Arguments) {
    if let Some(writer) = SCREEN_WRITER.get() {
        let mut writer = writer.lock();
        writer.attribute = writer.default_attribute.with_foreground(color);
        let _ = writer.write_fmt(args);
        writer.attribute = writer.default_attribute;
    }
}

/// Take over the screen and clear it.
pub fn init() {
    SCREEN_WRITER.init(Spinlock::new(ScreenWriter::new(Color::LightGray, Color::Black)));
    SCREEN_WRITER.lock().clear();
}
