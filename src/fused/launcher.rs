//! Kernel launcher interface

use super::params::LaunchParams;
use super::traits::{KernelTraits, LaunchPlan};
use crate::error::Result;
use crate::runtime::Runtime;

/// One compiled kernel variant plus its invocation wrapper
///
/// A launch is a two-step protocol: [`configure`](Self::configure) sizes the
/// launch without touching any buffer, the caller provisions the scratch the
/// returned plan asks for, then [`launch`](Self::launch) runs the kernel with
/// the same parameters and that plan.
pub trait FwdLauncher<R: Runtime>: Send + Sync {
    /// Static configuration of this variant
    fn traits(&self) -> KernelTraits;

    /// Sizing phase
    fn configure(&self, launch: &LaunchParams<'_, R>) -> Result<LaunchPlan> {
        self.traits().plan(launch)
    }

    /// Executing phase
    ///
    /// # Safety
    ///
    /// Every non-null address in `launch.params` must point to a live buffer
    /// of the dtype and extent documented on [`FwdParams`](super::FwdParams),
    /// output buffers must not alias inputs, and `workspace`/`barrier` must
    /// hold at least `plan.workspace_bytes` bytes and `plan.barrier_size`
    /// zeroed i32 slots. `plan` must come from `configure` on the same
    /// parameters.
    unsafe fn launch(&self, launch: &LaunchParams<'_, R>, plan: &LaunchPlan) -> Result<()>;
}
