//! Fused dropout + residual add + LayerNorm forward pass
//!
//! ```text
//! x  = dropout(x0 * rowscale * colscale) + residual
//! z  = (x - mean(x)) * rsqrt(var(x) + eps) * gamma + beta      (LayerNorm)
//! z  = x * rsqrt(mean(x^2) + eps) * gamma + beta               (RMSNorm)
//! ```
//!
//! The launch runs in two phases. The sizing phase asks the selected variant
//! for its grid and scratch needs without touching any buffer; the executing
//! phase runs it with that scratch wired in.

use super::key::{KernelTypes, LaunchKey, round_hidden_size};
use super::params::{DevicePtr, FwdParams, LaunchParams};
use super::registry::{FusedKernels, KernelRegistry};
use super::traits::LaunchPlan;
use super::validate::validate;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::runtime::{Device, DeviceGuard, Runtime, RuntimeClient};
use crate::tensor::Tensor;
use tracing::{debug, trace};

/// Tensors consumed by the fused forward pass
///
/// Only `x0` (`[rows, hidden]`) and `gamma` (`[hidden]`) are required.
pub struct FwdInputs<'a, R: Runtime> {
    /// Input, `[rows, hidden]`
    pub x0: &'a Tensor<R>,
    /// Residual added after dropout, `[rows, hidden]`
    pub residual: Option<&'a Tensor<R>>,
    /// Scale, `[hidden]`
    pub gamma: &'a Tensor<R>,
    /// Shift, `[hidden]`, same dtype as `gamma`
    pub beta: Option<&'a Tensor<R>>,
    /// Per-row input scale, `[rows]`, same dtype as `x0`
    pub rowscale: Option<&'a Tensor<R>>,
    /// Per-column input scale, `[hidden]`, same dtype as `gamma`
    pub colscale: Option<&'a Tensor<R>>,
    /// 1-based x0 row read for each processed row (0 skips the row), i32
    pub x0_subset: Option<&'a Tensor<R>>,
    /// 1-based z row written for each processed row (0 skips the row), i32
    pub z_subset: Option<&'a Tensor<R>>,
}

impl<'a, R: Runtime> FwdInputs<'a, R> {
    /// Inputs with only the required tensors
    pub fn new(x0: &'a Tensor<R>, gamma: &'a Tensor<R>) -> Self {
        Self {
            x0,
            residual: None,
            gamma,
            beta: None,
            rowscale: None,
            colscale: None,
            x0_subset: None,
            z_subset: None,
        }
    }

    /// Add a residual
    pub fn with_residual(mut self, residual: &'a Tensor<R>) -> Self {
        self.residual = Some(residual);
        self
    }

    /// Add a shift
    pub fn with_beta(mut self, beta: &'a Tensor<R>) -> Self {
        self.beta = Some(beta);
        self
    }

    /// Add a per-row scale
    pub fn with_rowscale(mut self, rowscale: &'a Tensor<R>) -> Self {
        self.rowscale = Some(rowscale);
        self
    }

    /// Add a per-column scale
    pub fn with_colscale(mut self, colscale: &'a Tensor<R>) -> Self {
        self.colscale = Some(colscale);
        self
    }

    /// Add input and output row subsets
    pub fn with_subsets(mut self, x0_subset: &'a Tensor<R>, z_subset: &'a Tensor<R>) -> Self {
        self.x0_subset = Some(x0_subset);
        self.z_subset = Some(z_subset);
        self
    }
}

/// Scalar options of the fused forward pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FwdOptions {
    /// Probability of zeroing an element of x0 (default: 0.0)
    pub dropout_p: f32,
    /// Added to the variance before the reciprocal square root (default: 1e-5)
    pub epsilon: f32,
    /// Scale applied to every row when row subsets are given (default: 1.0)
    pub rowscale_const: f32,
    /// Rows of the output when row subsets are given (default: 0)
    pub z_numrows: usize,
    /// Store the pre-norm sum in f32 when no residual is given (default: false)
    pub residual_in_fp32: bool,
    /// Use RMSNorm instead of LayerNorm (default: false)
    pub is_rms_norm: bool,
}

impl Default for FwdOptions {
    fn default() -> Self {
        Self {
            dropout_p: 0.0,
            epsilon: 1e-5,
            rowscale_const: 1.0,
            z_numrows: 0,
            residual_in_fp32: false,
            is_rms_norm: false,
        }
    }
}

impl FwdOptions {
    /// Set the dropout probability
    pub fn with_dropout(mut self, p: f32) -> Self {
        self.dropout_p = p;
        self
    }

    /// Set the variance epsilon
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the output rows and constant row scale used with row subsets
    pub fn with_subset_rows(mut self, z_numrows: usize, rowscale_const: f32) -> Self {
        self.z_numrows = z_numrows;
        self.rowscale_const = rowscale_const;
        self
    }

    /// Store the pre-norm sum in f32 when no residual is given
    pub fn with_residual_in_fp32(mut self, on: bool) -> Self {
        self.residual_in_fp32 = on;
        self
    }

    /// Normalize by root-mean-square instead of mean and variance
    pub fn rms_norm(mut self) -> Self {
        self.is_rms_norm = true;
        self
    }
}

/// Result of the fused forward pass
#[derive(Debug)]
pub struct FwdOutputs<R: Runtime> {
    /// Normalized output, `[rows, hidden]` or `[z_numrows, hidden]` with subsets
    pub z: Tensor<R>,
    /// Pre-norm sum in the residual dtype; present when a residual, dropout,
    /// either scale or row subsets are in use, or the residual dtype is wider than x0
    pub x: Option<Tensor<R>>,
    /// Keep mask (1 = kept), x0's shape as u8, only when dropout is active
    pub dmask: Option<Tensor<R>>,
    /// Per-row mean, f32 (zero under RMSNorm)
    pub mu: Tensor<R>,
    /// Per-row inverse standard deviation, f32
    pub rsigma: Tensor<R>,
}

/// Cross-block scratch for variants that split a row over several blocks
pub(crate) struct Scratch<R: Runtime> {
    /// `workspace_bytes` raw bytes
    pub(crate) workspace: Tensor<R>,
    /// `barrier_size` zeroed i32 slots
    pub(crate) barrier: Tensor<R>,
}

/// Allocate exactly the scratch a plan asks for
pub(crate) fn allocate_scratch<R: Runtime>(
    plan: &LaunchPlan,
    device: &R::Device,
) -> Result<Option<Scratch<R>>> {
    if plan.barrier_size == 0 {
        return Ok(None);
    }
    let barrier = Tensor::zeros(&[plan.barrier_size], DType::I32, device)?;
    let workspace = Tensor::empty(&[plan.workspace_bytes], DType::U8, device)?;
    trace!(
        workspace_bytes = plan.workspace_bytes,
        barrier_size = plan.barrier_size,
        "allocated cross-block scratch"
    );
    Ok(Some(Scratch { workspace, barrier }))
}

/// Fused dropout + residual add + LayerNorm forward pass
///
/// Uses the runtime's built-in kernel table. When `generator` is `None` and
/// dropout is active, the default generator of x0's device supplies the
/// random stream.
pub fn dropout_add_ln_fwd<R: FusedKernels>(
    client: &R::Client,
    inputs: FwdInputs<'_, R>,
    options: &FwdOptions,
    generator: Option<&Generator>,
) -> Result<FwdOutputs<R>> {
    dropout_add_ln_fwd_with(R::fwd_registry(), client, inputs, options, generator)
}

/// Fused forward pass dispatched through an explicit kernel table
pub fn dropout_add_ln_fwd_with<R: Runtime>(
    registry: &KernelRegistry<R>,
    client: &R::Client,
    inputs: FwdInputs<'_, R>,
    options: &FwdOptions,
    generator: Option<&Generator>,
) -> Result<FwdOutputs<R>> {
    let dims = validate(&inputs, options)?;
    let (rows, cols) = (dims.rows, dims.cols);

    let x0 = inputs.x0;
    let device = x0.device();
    if client.device().id() != device.id() {
        return Err(Error::DeviceMismatch {
            arg: "client",
            expected: device.id(),
            got: client.device().id(),
        });
    }
    let _guard = DeviceGuard::<R>::new(device)?;

    let itype = x0.dtype();
    let rtype = match inputs.residual {
        Some(residual) => residual.dtype(),
        None if options.residual_in_fp32 => DType::F32,
        None => itype,
    };
    let types = KernelTypes::new(inputs.gamma.dtype(), itype, rtype, itype, DType::F32);

    let key = LaunchKey::new(types, round_hidden_size(cols))?;
    let launcher = registry.lookup(key)?;
    debug!(?key, rows, cols, "selected fused layer norm variant");

    let has_dropout = options.dropout_p > 0.0;
    let has_subset = inputs.x0_subset.is_some();
    let save_x = inputs.residual.is_some()
        || has_dropout
        || inputs.rowscale.is_some()
        || inputs.colscale.is_some()
        || has_subset
        || rtype != itype;

    let x = if save_x {
        Some(Tensor::<R>::empty(&[rows, cols], rtype, device)?)
    } else {
        None
    };
    let dmask = if has_dropout {
        Some(Tensor::<R>::empty(x0.shape(), DType::U8, device)?)
    } else {
        None
    };
    let z_rows = if has_subset { options.z_numrows } else { rows };
    let z = Tensor::<R>::empty(&[z_rows, cols], itype, device)?;
    let mu = Tensor::<R>::empty(&[rows], DType::F32, device)?;
    let rsigma = Tensor::<R>::empty(&[rows], DType::F32, device)?;

    let scratch: Option<Scratch<R>>;
    let keep_p = 1.0 - options.dropout_p;
    let mut launch = LaunchParams::<R> {
        client,
        props: *client.device_properties(),
        params: FwdParams {
            rows,
            cols,
            x0_rows: x0.shape()[0],
            z_rows,
            types,
            x0: DevicePtr::of(x0),
            residual: DevicePtr::of_opt(inputs.residual),
            gamma: DevicePtr::of(inputs.gamma),
            beta: DevicePtr::of_opt(inputs.beta),
            rowscale: DevicePtr::of_opt(inputs.rowscale),
            colscale: DevicePtr::of_opt(inputs.colscale),
            x0_subset: DevicePtr::of_opt(inputs.x0_subset),
            z_subset: DevicePtr::of_opt(inputs.z_subset),
            x: DevicePtr::of_opt(x.as_ref()),
            dmask: DevicePtr::of_opt(dmask.as_ref()),
            mu: DevicePtr::of(&mu),
            rs: DevicePtr::of(&rsigma),
            z: DevicePtr::of(&z),
            workspace: DevicePtr::null(),
            barrier: DevicePtr::null(),
            epsilon: options.epsilon,
            dropout_keep_p: keep_p,
            dropout_scale: 1.0 / keep_p,
            inverse_cols: 1.0 / cols as f32,
            rowscale_const: options.rowscale_const,
            is_rms_norm: options.is_rms_norm,
            philox: None,
        },
    };

    let plan = launcher.configure(&launch)?;
    debug!(?plan, "sized fused layer norm launch");

    scratch = allocate_scratch::<R>(&plan, device)?;
    if let Some(scratch) = &scratch {
        launch.params.workspace = DevicePtr::of(&scratch.workspace);
        launch.params.barrier = DevicePtr::of(&scratch.barrier);
    }

    // Reserve counters last: a call that fails before launching leaves the
    // generator untouched.
    if has_dropout {
        let counters = plan.elts_per_thread as u64;
        let state = match generator {
            Some(generator) => generator.philox_state(counters),
            None => Generator::default_for(device.id()).philox_state(counters),
        };
        trace!(seed = state.seed, offset = state.offset, counters, "reserved dropout counters");
        launch.params.philox = Some(state);
    }

    // SAFETY: every address in `launch.params` was taken from a tensor that
    // passed validation or was just allocated with the extent the kernel
    // expects, and all of them outlive this call. Scratch matches `plan`.
    unsafe { launcher.launch(&launch, &plan)? };

    Ok(FwdOutputs {
        z,
        x,
        dmask,
        mu,
        rsigma,
    })
}

/// Fused normalization operations
pub trait FusedNormOps<R: Runtime> {
    /// Fused dropout + residual add + LayerNorm (or RMSNorm) forward pass
    ///
    /// # Arguments
    ///
    /// * `inputs` - x0 and gamma plus the optional residual, beta, scales and row subsets
    /// * `options` - Dropout probability, epsilon and normalization mode
    /// * `generator` - Random stream for the dropout mask; the device default when `None`
    fn dropout_add_ln_fwd(
        &self,
        inputs: FwdInputs<'_, R>,
        options: &FwdOptions,
        generator: Option<&Generator>,
    ) -> Result<FwdOutputs<R>>;
}
