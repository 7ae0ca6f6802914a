// The entry points here are only reached from the assembly boot stub, so
// nothing is re-exported.
cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        mod x86;
    }
}
