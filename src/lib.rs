//! # dropnorm
//!
//! **Kernel dispatch and launch orchestration for fused dropout + residual add + LayerNorm.**
//!
//! dropnorm picks the right precompiled variant of a fused
//! `dropout(x0) + residual -> LayerNorm/RMSNorm` kernel for a call, sizes its
//! launch, provisions the cross-block scratch it asks for, reserves a slice
//! of the Philox random stream for the dropout mask, and runs it.
//!
//! ## Pieces
//!
//! - **Launch keys**: weight, input, residual, output, and compute dtypes plus
//!   the padded hidden size packed into one `u64`
//! - **Kernel registry**: launch key to launcher, one table per runtime
//! - **Validation**: shape, dtype, device, and layout checks before any allocation
//! - **Two-phase launch**: a sizing pass that touches no buffers, then the real launch
//! - **Generator**: per-device Philox4x32-10 counter reservation for dropout
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dropnorm::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//! let x0 = Tensor::<CpuRuntime>::from_slice(&data, &[rows, 1024], &device)?;
//! let gamma = Tensor::<CpuRuntime>::from_slice(&weights, &[1024], &device)?;
//!
//! let options = FwdOptions { dropout_p: 0.1, ..Default::default() };
//! let out = client.dropout_add_ln_fwd(FwdInputs::new(&x0, &gamma), &options, None)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): Multi-threaded host kernels
//! - `cuda`: NVIDIA CUDA backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod dtype;
pub mod error;
pub mod fused;
pub mod generator;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::fused::{
        FusedNormOps, FwdInputs, FwdOptions, FwdOutputs, KernelTypes, LaunchKey,
        dropout_add_ln_fwd,
    };
    pub use crate::generator::Generator;
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::tensor::{Layout, Tensor};

    pub use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::CudaRuntime;
}
