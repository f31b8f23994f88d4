//! FusedNormOps implementation for CUDA runtime

use super::{CudaClient, CudaRuntime};
use crate::error::Result;
use crate::fused::{FusedNormOps, FwdInputs, FwdOptions, FwdOutputs, dropout_add_ln_fwd};
use crate::generator::Generator;

/// FusedNormOps implementation for CUDA runtime.
impl FusedNormOps<CudaRuntime> for CudaClient {
    fn dropout_add_ln_fwd(
        &self,
        inputs: FwdInputs<'_, CudaRuntime>,
        options: &FwdOptions,
        generator: Option<&Generator>,
    ) -> Result<FwdOutputs<CudaRuntime>> {
        dropout_add_ln_fwd::<CudaRuntime>(self, inputs, options, generator)
    }
}
