//! Device launcher for the fused dropout + residual add + LayerNorm forward pass

use cudarc::driver::safe::{CudaFunction, LaunchConfig};
use cudarc::driver::{DeviceRepr, PushKernelArg};

use super::loader::{LN_FWD_MODULE, get_kernel_function, get_or_load_module};
use crate::error::{Error, Result};
use crate::fused::{FwdLauncher, FwdParams, KernelTraits, LaunchParams, LaunchPlan, Variant};
use crate::runtime::cuda::{CudaClient, CudaRuntime};

/// Parameter block passed by value to the device kernel
///
/// Field order and widths match the kernel-side struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
struct KernelFwdParams {
    x0: u64,
    residual: u64,
    gamma: u64,
    beta: u64,
    rowscale: u64,
    colscale: u64,
    x0_subset: u64,
    z_subset: u64,
    x: u64,
    dmask: u64,
    mu: u64,
    rs: u64,
    z: u64,
    workspace: u64,
    barrier: u64,
    philox_seed: u64,
    philox_offset: u64,

    rows: u32,
    cols: u32,
    x0_rows: u32,
    z_rows: u32,
    ctas_per_col: u32,

    epsilon: f32,
    dropout_keep_p: f32,
    dropout_scale: f32,
    inverse_cols: f32,
    rowscale_const: f32,

    is_rms_norm: u32,
    even_cols: u32,
}

// SAFETY: plain-old-data with a C layout the kernel reads by value.
unsafe impl DeviceRepr for KernelFwdParams {}

/// Narrow a launch dimension to the kernel's 32-bit field
fn dim_u32(arg: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::invalid_argument(arg, format!("{value} does not fit in 32 bits")))
}

impl KernelFwdParams {
    fn new(p: &FwdParams<'_>, plan: &LaunchPlan) -> Result<Self> {
        let (philox_seed, philox_offset) = p.philox.map_or((0, 0), |s| (s.seed, s.offset));
        Ok(Self {
            x0: p.x0.addr(),
            residual: p.residual.addr(),
            gamma: p.gamma.addr(),
            beta: p.beta.addr(),
            rowscale: p.rowscale.addr(),
            colscale: p.colscale.addr(),
            x0_subset: p.x0_subset.addr(),
            z_subset: p.z_subset.addr(),
            x: p.x.addr(),
            dmask: p.dmask.addr(),
            mu: p.mu.addr(),
            rs: p.rs.addr(),
            z: p.z.addr(),
            workspace: p.workspace.addr(),
            barrier: p.barrier.addr(),
            philox_seed,
            philox_offset,
            rows: dim_u32("rows", p.rows)?,
            cols: dim_u32("cols", p.cols)?,
            x0_rows: dim_u32("x0_rows", p.x0_rows)?,
            z_rows: dim_u32("z_numrows", p.z_rows)?,
            ctas_per_col: dim_u32("ctas_per_col", plan.ctas_per_col)?,
            epsilon: p.epsilon,
            dropout_keep_p: p.dropout_keep_p,
            dropout_scale: p.dropout_scale,
            inverse_cols: p.inverse_cols,
            rowscale_const: p.rowscale_const,
            is_rms_norm: p.is_rms_norm as u32,
            even_cols: plan.even_cols as u32,
        })
    }
}

/// Launcher for one compiled forward variant
///
/// The kernel symbol is `ln_fwd_<hidden>_<w>_<i>_<r>_<o>_<c>`.
#[derive(Debug, Clone)]
pub struct CudaFwdLauncher {
    traits: KernelTraits,
    symbol: String,
}

impl CudaFwdLauncher {
    /// Launcher for a registered variant
    pub fn new(variant: Variant) -> Self {
        Self {
            traits: variant.traits,
            symbol: format!("ln_fwd_{}_{}", variant.traits.hidden_size, variant.types),
        }
    }

    /// Kernel symbol inside the PTX module
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn function(&self, client: &CudaClient) -> Result<CudaFunction> {
        let module = get_or_load_module(client.context(), client.device.index, LN_FWD_MODULE)?;
        get_kernel_function(&module, &self.symbol)
    }
}

impl FwdLauncher<CudaRuntime> for CudaFwdLauncher {
    fn traits(&self) -> KernelTraits {
        self.traits
    }

    fn configure(&self, launch: &LaunchParams<'_, CudaRuntime>) -> Result<LaunchPlan> {
        let func = self.function(launch.client)?;
        let ctas_per_sm = func.occupancy_max_active_blocks_per_multiprocessor(
            self.traits.threads_per_cta() as u32,
            self.traits.smem_bytes_fwd(),
            None,
        )?;
        self.traits.plan_with_occupancy(launch, ctas_per_sm as usize)
    }

    unsafe fn launch(&self, launch: &LaunchParams<'_, CudaRuntime>, plan: &LaunchPlan) -> Result<()> {
        let p = &launch.params;
        if p.rows == 0 {
            return Ok(());
        }
        if plan.is_cooperative() && (p.workspace.is_null() || p.barrier.is_null()) {
            return Err(Error::Internal(
                "cooperative launch without workspace or barrier".to_string(),
            ));
        }

        let client = launch.client;
        let func = self.function(client)?;
        let params = KernelFwdParams::new(p, plan)?;
        let cfg = LaunchConfig {
            grid_dim: (dim_u32("grid_size", plan.grid_size())?, 1, 1),
            block_dim: (plan.threads_per_cta as u32, 1, 1),
            shared_mem_bytes: plan.smem_bytes as u32,
        };

        tracing::trace!(symbol = %self.symbol, ?cfg, cooperative = plan.is_cooperative(), "launching");

        let mut builder = client.stream().launch_builder(&func);
        builder.arg(&params);
        // SAFETY: the caller upholds the address contract of `FwdLauncher::launch`,
        // and `params` mirrors the kernel's parameter struct.
        unsafe {
            if plan.is_cooperative() {
                builder.launch_cooperative(cfg)?;
            } else {
                builder.launch(cfg)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::fused::{DevicePtr, KernelTypes, traits_for};

    fn params(rows: usize, x0_rows: usize, z_rows: usize) -> FwdParams<'static> {
        FwdParams {
            rows,
            cols: 1024,
            x0_rows,
            z_rows,
            types: KernelTypes::new(DType::F32, DType::F16, DType::F16, DType::F16, DType::F32),
            x0: DevicePtr::null(),
            residual: DevicePtr::null(),
            gamma: DevicePtr::null(),
            beta: DevicePtr::null(),
            rowscale: DevicePtr::null(),
            colscale: DevicePtr::null(),
            x0_subset: DevicePtr::null(),
            z_subset: DevicePtr::null(),
            x: DevicePtr::null(),
            dmask: DevicePtr::null(),
            mu: DevicePtr::null(),
            rs: DevicePtr::null(),
            z: DevicePtr::null(),
            workspace: DevicePtr::null(),
            barrier: DevicePtr::null(),
            epsilon: 1e-5,
            dropout_keep_p: 1.0,
            dropout_scale: 1.0,
            inverse_cols: 1.0 / 1024.0,
            rowscale_const: 1.0,
            is_rms_norm: false,
            philox: None,
        }
    }

    fn plan() -> LaunchPlan {
        LaunchPlan {
            ctas_per_col: 432,
            ctas_per_row: 1,
            threads_per_cta: 128,
            smem_bytes: 0,
            elts_per_thread: 8,
            workspace_bytes: 0,
            barrier_size: 0,
            even_cols: true,
        }
    }

    #[test]
    fn test_param_block_carries_dimensions() {
        let block = KernelFwdParams::new(&params(4096, 4096, 8192), &plan()).unwrap();
        assert_eq!((block.rows, block.cols, block.z_rows), (4096, 1024, 8192));
        assert_eq!((block.ctas_per_col, block.even_cols), (432, 1));
    }

    #[test]
    fn test_param_block_rejects_wide_dimensions() {
        let wide = u32::MAX as usize + 1;
        let err = KernelFwdParams::new(&params(4, 4, wide), &plan()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "z_numrows", .. }));
        let err = KernelFwdParams::new(&params(wide, wide, wide), &plan()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "rows", .. }));
    }

    #[test]
    fn test_symbol_names_types_and_hidden_size() {
        let types = KernelTypes::new(DType::F32, DType::BF16, DType::F32, DType::BF16, DType::F32);
        let launcher = CudaFwdLauncher::new(Variant {
            types,
            traits: traits_for(1024, DType::BF16),
        });
        assert_eq!(launcher.symbol(), "ln_fwd_1024_fp32_bf16_fp32_bf16_fp32");
    }
}
