//! FusedNormOps implementation for CPU runtime

use super::{CpuClient, CpuRuntime};
use crate::error::Result;
use crate::fused::{FusedNormOps, FwdInputs, FwdOptions, FwdOutputs, dropout_add_ln_fwd};
use crate::generator::Generator;

/// FusedNormOps implementation for CPU runtime.
impl FusedNormOps<CpuRuntime> for CpuClient {
    fn dropout_add_ln_fwd(
        &self,
        inputs: FwdInputs<'_, CpuRuntime>,
        options: &FwdOptions,
        generator: Option<&Generator>,
    ) -> Result<FwdOutputs<CpuRuntime>> {
        dropout_add_ln_fwd::<CpuRuntime>(self, inputs, options, generator)
    }
}
