#![cfg_attr(not(test), no_std)]
#![cfg_attr(test, allow(dead_code))]

#[macro_use]
mod arch;

mod boot;
mod consts;
mod err;
mod io;
pub mod mem;
mod util;

extern crate alloc;
