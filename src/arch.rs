// Pulls in the architecture-specific submodule of the invoking module. Both
// 32-bit and 64-bit x86 share a single `x86` submodule.
macro_rules! arch_submodules {
    () => {
        cfg_if::cfg_if! {
            if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
                mod x86;
                pub use self::x86::*;
            }
        }
    };
}
