arch_submodules!();
