//! Device I/O.

mod arch;
#[macro_use]
pub mod log;

pub use arch::port;
