//! CPU runtime implementation
//!
//! The CPU runtime uses standard heap allocation and ships host reference
//! kernels for every registered fused normalization variant, so the full
//! dispatch and two-phase launch path runs without a GPU.
//!
//! Rows are processed in parallel with rayon when the `rayon` feature is
//! enabled (the default).

mod client;
mod device;
pub(crate) mod kernels;
mod ops;
mod runtime;

pub use client::CpuClient;
pub use device::CpuDevice;
pub use kernels::HostFwdLauncher;
pub use runtime::CpuRuntime;
