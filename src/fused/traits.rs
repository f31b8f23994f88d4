//! Kernel traits: the compile-time shape of a kernel variant and the launch
//! plan derived from it

use super::params::LaunchParams;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Size of one f32 (mean, m2) statistics pair
const STATS_BYTES: usize = 8;

/// Static configuration of one kernel variant
///
/// A row of `hidden_size` elements is split across `ctas_per_row` blocks of
/// `warps_n` warps; each block processes `warps_m` rows at a time, and each
/// thread loads `bytes_per_ldg` bytes per vectorized load.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct KernelTraits {
    /// Padded hidden size the variant is compiled for
    pub hidden_size: usize,
    /// Blocks cooperating on one row
    pub ctas_per_row: usize,
    /// Rows per block
    pub warps_m: usize,
    /// Warps per row within a block
    pub warps_n: usize,
    /// Bytes per vectorized load
    pub bytes_per_ldg: usize,
}

impl KernelTraits {
    /// Threads per warp assumed by every variant
    pub const WARP_SIZE: usize = 32;

    /// Describe a kernel variant
    pub const fn new(
        hidden_size: usize,
        ctas_per_row: usize,
        warps_m: usize,
        warps_n: usize,
        bytes_per_ldg: usize,
    ) -> Self {
        Self {
            hidden_size,
            ctas_per_row,
            warps_m,
            warps_n,
            bytes_per_ldg,
        }
    }

    /// Threads sharing one row within a block
    #[inline]
    pub fn threads_per_row(&self) -> usize {
        self.warps_n * Self::WARP_SIZE
    }

    /// Threads per block
    #[inline]
    pub fn threads_per_cta(&self) -> usize {
        self.warps_m * self.threads_per_row()
    }

    /// Rows a block processes per iteration
    #[inline]
    pub fn rows_per_cta(&self) -> usize {
        self.warps_m
    }

    /// Elements per vectorized load of the input type
    #[inline]
    pub fn num_elts(&self, itype: DType) -> usize {
        self.bytes_per_ldg / itype.size_in_bytes()
    }

    /// Vectorized loads per thread to cover one row
    #[inline]
    pub fn ldgs(&self, itype: DType) -> usize {
        self.hidden_size / (self.ctas_per_row * self.threads_per_row() * self.num_elts(itype))
    }

    /// Dynamic shared memory for the in-block reduction
    #[inline]
    pub fn smem_bytes_fwd(&self) -> usize {
        if self.warps_n > 1 {
            self.warps_m * self.warps_n * STATS_BYTES * 2
        } else {
            0
        }
    }

    /// Whether the variant tiles its hidden size exactly for the given input type
    pub fn is_valid_for(&self, itype: DType) -> bool {
        let num_elts = self.num_elts(itype);
        let step = self.ctas_per_row * self.threads_per_row() * num_elts;
        num_elts > 0 && step > 0 && self.hidden_size % step == 0
    }

    /// Sizing phase: derive grid geometry and scratch requirements
    ///
    /// Resident blocks per multiprocessor come from the launch's device
    /// properties. Touches no buffer contents.
    pub fn plan<R: Runtime>(&self, launch: &LaunchParams<'_, R>) -> Result<LaunchPlan> {
        let ctas_per_sm = launch
            .props
            .max_active_blocks(self.threads_per_cta() as u32, self.smem_bytes_fwd() as u32);
        self.plan_with_occupancy(launch, ctas_per_sm as usize)
    }

    /// Sizing phase with a measured number of resident blocks per multiprocessor
    pub fn plan_with_occupancy<R: Runtime>(
        &self,
        launch: &LaunchParams<'_, R>,
        ctas_per_sm: usize,
    ) -> Result<LaunchPlan> {
        let params = &launch.params;
        let itype = params.types.itype;
        if !self.is_valid_for(itype) {
            return Err(Error::Internal(format!(
                "kernel traits {self:?} do not tile hidden size for {itype}"
            )));
        }

        let threads_per_cta = self.threads_per_cta();
        let smem_bytes = self.smem_bytes_fwd();
        let ctas_per_sm = ctas_per_sm.max(1);
        let ctas_per_col =
            (launch.props.multiprocessor_count as usize * ctas_per_sm / self.ctas_per_row).max(1);
        let rows_per_loop = ctas_per_col * self.rows_per_cta();
        let elts_per_thread =
            params.rows.div_ceil(rows_per_loop) * self.ldgs(itype) * self.num_elts(itype);

        let (barrier_size, workspace_bytes) = if self.ctas_per_row > 1 {
            (
                2 * ctas_per_col,
                ctas_per_col * self.warps_m * self.ctas_per_row * STATS_BYTES * 2,
            )
        } else {
            (0, 0)
        };

        Ok(LaunchPlan {
            ctas_per_col,
            ctas_per_row: self.ctas_per_row,
            threads_per_cta,
            smem_bytes,
            elts_per_thread,
            workspace_bytes,
            barrier_size,
            even_cols: params.cols == self.hidden_size,
        })
    }
}

/// Output of the sizing phase, threaded into the executing phase
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Blocks along the row dimension of the grid
    pub ctas_per_col: usize,
    /// Blocks cooperating on one row
    pub ctas_per_row: usize,
    /// Threads per block
    pub threads_per_cta: usize,
    /// Dynamic shared memory per block
    pub smem_bytes: usize,
    /// Random numbers each thread consumes; the generator offset advances by this
    pub elts_per_thread: usize,
    /// Scratch bytes the kernel needs for cross-block reductions
    pub workspace_bytes: usize,
    /// Number of i32 barrier slots the kernel needs, 0 for single-block rows
    pub barrier_size: usize,
    /// Whether `cols` equals the padded hidden size
    pub even_cols: bool,
}

impl LaunchPlan {
    /// Total blocks in the grid
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.ctas_per_col * self.ctas_per_row
    }

    /// Whether the launch needs cooperative multi-block synchronization
    #[inline]
    pub fn is_cooperative(&self) -> bool {
        self.ctas_per_row > 1
    }
}
