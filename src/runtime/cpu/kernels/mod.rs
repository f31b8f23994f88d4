//! CPU kernel implementations
//!
//! The CPU runtime registers one host launcher per variant of the shared
//! variant table, so every combination that resolves on a GPU also resolves
//! (and runs) on the host.

mod fused_ln;

pub use fused_ln::HostFwdLauncher;

use super::CpuRuntime;
use crate::fused::{FusedKernels, FwdLauncher, KernelRegistry, Variant, build_registry};
use std::sync::{Arc, OnceLock};

impl FusedKernels for CpuRuntime {
    fn fwd_registry() -> &'static KernelRegistry<Self> {
        static REGISTRY: OnceLock<KernelRegistry<CpuRuntime>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            build_registry(|variant: Variant| -> Arc<dyn FwdLauncher<CpuRuntime>> {
                Arc::new(HostFwdLauncher::new(variant.traits))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fused::{HIDDEN_SIZES, TYPE_COMBINATIONS};

    #[test]
    fn test_registry_holds_every_variant() {
        let registry = CpuRuntime::fwd_registry();
        assert_eq!(registry.len(), HIDDEN_SIZES.len() * TYPE_COMBINATIONS.len());
        assert!(std::ptr::eq(registry, CpuRuntime::fwd_registry()));
    }
}
