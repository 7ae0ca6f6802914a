pub mod heap;
pub mod raw;
mod region;
mod types;

pub use types::{align_up, size, VirtualAddress};

pub use region::AddressRegion;
