//! Host kernel for the fused dropout + residual add + LayerNorm forward pass
//!
//! The grid of the device kernel is mirrored by "lanes": lane `l` plays the
//! role of warp row `l % warps_m` in block column `l / warps_m` and processes
//! rows `l, l + lanes, l + 2 * lanes, ...`. When a row is split across several
//! blocks, each lane publishes per-block partial statistics in its own
//! workspace slots and combines them, the way the cooperating blocks do on a
//! device. A single lane covers every block of its row, so the barrier
//! counters are not needed on the host.

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::fused::{FwdLauncher, FwdParams, KernelTraits, LaunchParams, LaunchPlan};
use crate::runtime::cpu::CpuRuntime;
use half::{bf16, f16};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// f32 values per workspace slot: count, mean, m2, padding
const SLOT_FLOATS: usize = 4;

/// Host launcher for one registered variant
#[derive(Debug, Clone, Copy)]
pub struct HostFwdLauncher {
    traits: KernelTraits,
}

impl HostFwdLauncher {
    /// Launcher for a variant with the given grid shape
    pub fn new(traits: KernelTraits) -> Self {
        Self { traits }
    }
}

impl FwdLauncher<CpuRuntime> for HostFwdLauncher {
    fn traits(&self) -> KernelTraits {
        self.traits
    }

    unsafe fn launch(&self, launch: &LaunchParams<'_, CpuRuntime>, plan: &LaunchPlan) -> Result<()> {
        let p = &launch.params;
        let t = p.types;
        if p.rows == 0 {
            return Ok(());
        }
        if plan.is_cooperative() && (p.workspace.is_null() || p.barrier.is_null()) {
            return Err(Error::Internal(
                "cooperative launch without workspace or barrier".to_string(),
            ));
        }
        if p.has_dropout() && p.philox.is_none() {
            return Err(Error::Internal(
                "dropout launch without generator state".to_string(),
            ));
        }
        if p.has_subset() {
            unsafe { check_subsets(p)? };
        }

        use DType::{BF16, F16, F32};
        macro_rules! run {
            ($w:ty, $i:ty, $r:ty, $o:ty) => {
                unsafe { run_grid::<$w, $i, $r, $o>(p, plan, self.traits.warps_m) }
            };
        }
        match (t.wtype, t.itype, t.rtype, t.otype) {
            (F32, F32, F32, F32) => run!(f32, f32, f32, f32),
            (F32, F16, F32, F16) => run!(f32, f16, f32, f16),
            (F32, F16, F16, F16) => run!(f32, f16, f16, f16),
            (F32, BF16, F32, BF16) => run!(f32, bf16, f32, bf16),
            (F32, BF16, BF16, BF16) => run!(f32, bf16, bf16, bf16),
            (F16, F16, F16, F16) => run!(f16, f16, f16, f16),
            (BF16, BF16, BF16, BF16) => run!(bf16, bf16, bf16, bf16),
            _ => {
                return Err(Error::UnsupportedCombination {
                    hidden_size: self.traits.hidden_size,
                    wtype: t.wtype,
                    itype: t.itype,
                    rtype: t.rtype,
                    otype: t.otype,
                    ctype: t.ctype,
                });
            }
        }
        Ok(())
    }
}

/// Reject subset indices that would read or write out of bounds, or make two
/// lanes write the same output row
///
/// # Safety
/// `x0_subset` and `z_subset` must point to `rows` i32 values.
unsafe fn check_subsets(p: &FwdParams<'_>) -> Result<()> {
    let (x0_subset, z_subset) = unsafe {
        (
            std::slice::from_raw_parts(p.x0_subset.cast::<i32>(), p.rows),
            std::slice::from_raw_parts(p.z_subset.cast::<i32>(), p.rows),
        )
    };

    let check = |arg: &'static str, subset: &[i32], extent: usize, unique: bool| -> Result<()> {
        let mut seen = vec![false; extent];
        for &idx in subset {
            if idx < 0 || idx as usize > extent {
                return Err(Error::invalid_argument(
                    arg,
                    format!("index {idx} outside 0..={extent}"),
                ));
            }
            if idx == 0 || !unique {
                continue;
            }
            let slot = &mut seen[idx as usize - 1];
            if *slot {
                return Err(Error::invalid_argument(arg, format!("row {idx} appears twice")));
            }
            *slot = true;
        }
        Ok(())
    };

    // Each kept x0 row owns a dmask row, so x0 rows must be distinct under dropout.
    check("x0_subset", x0_subset, p.x0_rows, p.has_dropout())?;
    check("z_subset", z_subset, p.z_rows, true)
}

/// Process every row, one lane per (block column, warp row) pair
///
/// # Safety
/// See [`FwdLauncher::launch`].
unsafe fn run_grid<W: Element, I: Element, Rs: Element, O: Element>(
    p: &FwdParams<'_>,
    plan: &LaunchPlan,
    warps_m: usize,
) {
    let lanes = (plan.ctas_per_col * warps_m).min(p.rows);
    let lane = |lane: usize| unsafe { run_lane::<W, I, Rs, O>(p, plan, lane, lanes) };

    #[cfg(feature = "rayon")]
    {
        (0..lanes).into_par_iter().for_each(lane);
    }

    #[cfg(not(feature = "rayon"))]
    {
        (0..lanes).for_each(lane);
    }
}

/// Running (count, mean, m2) statistics
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Stats {
    count: f32,
    mean: f32,
    m2: f32,
}

impl Stats {
    fn of(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let count = values.len() as f32;
        let mean = values.iter().sum::<f32>() / count;
        let m2 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        Self { count, mean, m2 }
    }

    /// Chan et al. pairwise combination
    fn merge(self, other: Self) -> Self {
        if other.count == 0.0 {
            return self;
        }
        if self.count == 0.0 {
            return other;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        Self {
            count,
            mean: self.mean + delta * other.count / count,
            m2: self.m2 + other.m2 + delta * delta * self.count * other.count / count,
        }
    }
}

/// # Safety
/// See [`FwdLauncher::launch`]. Lanes touch disjoint rows of every output and
/// disjoint workspace slots.
unsafe fn run_lane<W: Element, I: Element, Rs: Element, O: Element>(
    p: &FwdParams<'_>,
    plan: &LaunchPlan,
    lane: usize,
    lanes: usize,
) {
    let cols = p.cols;
    let has_dropout = p.has_dropout();
    let has_subset = p.has_subset();

    let (gamma, beta, colscale) = unsafe {
        (
            std::slice::from_raw_parts(p.gamma.cast::<W>(), cols),
            (!p.beta.is_null()).then(|| std::slice::from_raw_parts(p.beta.cast::<W>(), cols)),
            (!p.colscale.is_null())
                .then(|| std::slice::from_raw_parts(p.colscale.cast::<W>(), cols)),
        )
    };

    // Columns owned by each cooperating block
    let block_cols = cols.div_ceil(plan.ctas_per_row);
    let workspace = p.workspace.cast_mut::<f32>();

    let mut xf = vec![0.0f32; cols];

    for row in (lane..p.rows).step_by(lanes) {
        let (row_x0, row_z) = if has_subset {
            unsafe {
                (
                    *p.x0_subset.cast::<i32>().add(row) as usize,
                    *p.z_subset.cast::<i32>().add(row) as usize,
                )
            }
        } else {
            (row + 1, row + 1)
        };
        let rowscale_val = if has_subset {
            p.rowscale_const
        } else if p.rowscale.is_null() {
            1.0
        } else {
            unsafe { (*p.rowscale.cast::<I>().add(row)).to_f32() }
        };

        let residual = (!p.residual.is_null()).then(|| unsafe {
            std::slice::from_raw_parts(p.residual.cast::<Rs>().add(row * cols), cols)
        });

        // x = dropout(x0 * rowscale) * colscale + residual
        if row_x0 > 0 {
            let base = (row_x0 - 1) * cols;
            let x0 = unsafe { std::slice::from_raw_parts(p.x0.cast::<I>().add(base), cols) };
            let mut dmask = has_dropout.then(|| unsafe {
                std::slice::from_raw_parts_mut(p.dmask.cast_mut::<u8>().add(base), cols)
            });

            for c0 in (0..cols).step_by(4) {
                let draws = match p.philox {
                    Some(state) if has_dropout => state.uniform4(((base + c0) / 4) as u64),
                    _ => [0.0; 4],
                };
                for (j, &u) in draws.iter().enumerate().take(cols - c0) {
                    let c = c0 + j;
                    let keep = !has_dropout || u <= p.dropout_keep_p;
                    if let Some(mask) = dmask.as_deref_mut() {
                        mask[c] = keep as u8;
                    }
                    let mut v = x0[c].to_f32() * rowscale_val;
                    v = match (keep, has_dropout) {
                        (false, _) => 0.0,
                        (true, true) => v * p.dropout_scale,
                        (true, false) => v,
                    };
                    if let Some(colscale) = colscale {
                        v *= colscale[c].to_f32();
                    }
                    xf[c] = residual.map_or(v, |r| v + r[c].to_f32());
                }
            }
        } else {
            for (c, x) in xf.iter_mut().enumerate() {
                *x = residual.map_or(0.0, |r| r[c].to_f32());
            }
        }

        if !p.x.is_null() {
            let x = unsafe {
                std::slice::from_raw_parts_mut(p.x.cast_mut::<Rs>().add(row * cols), cols)
            };
            for (dst, &v) in x.iter_mut().zip(&xf) {
                *dst = Rs::from_f32(v);
            }
        }

        // Per-block partial statistics, combined across the row
        let stats = if plan.is_cooperative() {
            let slots = unsafe {
                std::slice::from_raw_parts_mut(
                    workspace.add(lane * plan.ctas_per_row * SLOT_FLOATS),
                    plan.ctas_per_row * SLOT_FLOATS,
                )
            };
            for (block, slot) in slots.chunks_exact_mut(SLOT_FLOATS).enumerate() {
                let start = (block * block_cols).min(cols);
                let end = ((block + 1) * block_cols).min(cols);
                let s = Stats::of(&xf[start..end]);
                slot.copy_from_slice(&[s.count, s.mean, s.m2, 0.0]);
            }
            slots
                .chunks_exact(SLOT_FLOATS)
                .map(|slot| Stats {
                    count: slot[0],
                    mean: slot[1],
                    m2: slot[2],
                })
                .fold(Stats::default(), Stats::merge)
        } else {
            Stats::of(&xf)
        };

        let mu = stats.mean;
        let rms_correction = if p.is_rms_norm { mu * mu } else { 0.0 };
        let rs = 1.0 / (stats.m2 * p.inverse_cols + p.epsilon + rms_correction).sqrt();
        let center = if p.is_rms_norm { 0.0 } else { mu };
        unsafe {
            *p.mu.cast_mut::<f32>().add(row) = center;
            *p.rs.cast_mut::<f32>().add(row) = rs;
        }

        if row_z > 0 {
            let z = unsafe {
                std::slice::from_raw_parts_mut(p.z.cast_mut::<O>().add((row_z - 1) * cols), cols)
            };
            for (c, (dst, &x)) in z.iter_mut().zip(&xf).enumerate() {
                let y = rs * (x - center);
                let b = beta.map_or(0.0, |b| b[c].to_f32());
                *dst = O::from_f32(gamma[c].to_f32() * y + b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_merge_matches_single_pass() {
        let values: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let whole = Stats::of(&values);
        let merged = values
            .chunks(24)
            .map(Stats::of)
            .fold(Stats::default(), Stats::merge);

        assert_eq!(merged.count, whole.count);
        assert!((merged.mean - whole.mean).abs() < 1e-6);
        assert!((merged.m2 - whole.m2).abs() < 1e-4);
    }

    #[test]
    fn test_stats_merge_ignores_empty() {
        let s = Stats::of(&[1.0, 3.0]);
        assert_eq!(s.merge(Stats::default()), s);
        assert_eq!(Stats::default().merge(s), s);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.m2, 2.0);
    }
}
