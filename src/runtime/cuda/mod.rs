//! CUDA runtime implementation
//!
//! This module provides GPU execution via NVIDIA CUDA using cudarc.
//!
//! # Features
//!
//! - `CudaDevice` - Represents a CUDA GPU device and its occupancy limits
//! - `CudaClient` - Manages GPU stream and context, launches kernels
//! - `CudaRuntime` - Implements the generic Runtime trait
//! - `CudaFwdLauncher` - Launches compiled forward variants from PTX
//!
//! Kernels are loaded from `ln_fwd.ptx` in the directory named by the
//! `DROPNORM_PTX_DIR` environment variable. Variants whose rows span several
//! blocks are launched cooperatively.

mod cache;
mod client;
mod device;
mod kernels;
mod ops;
mod runtime;

pub use client::CudaClient;
pub use device::CudaDevice;
pub use kernels::{CudaFwdLauncher, LN_FWD_MODULE, PTX_DIR_ENV};
pub use runtime::{CudaRuntime, cuda_device, is_cuda_available};
