//! CUDA kernel launchers
//!
//! Every variant of the shared table is registered with a launcher that
//! resolves its kernel from the `ln_fwd` PTX module on first use.

mod fused_ln;
mod loader;

pub use fused_ln::CudaFwdLauncher;
pub use loader::{LN_FWD_MODULE, PTX_DIR_ENV};

use super::CudaRuntime;
use crate::fused::{FusedKernels, FwdLauncher, KernelRegistry, Variant, build_registry};
use std::sync::{Arc, OnceLock};

impl FusedKernels for CudaRuntime {
    fn fwd_registry() -> &'static KernelRegistry<Self> {
        static REGISTRY: OnceLock<KernelRegistry<CudaRuntime>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            build_registry(|variant: Variant| -> Arc<dyn FwdLauncher<CudaRuntime>> {
                Arc::new(CudaFwdLauncher::new(variant))
            })
        })
    }
}
