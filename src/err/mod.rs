//! Error handling.

#[cfg(not(test))]
mod panic;
