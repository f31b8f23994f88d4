//! Argument validation for the fused forward pass
//!
//! Checks run in a fixed order and stop at the first violation. Nothing is
//! allocated and no work is issued before every check passes.

use super::forward::{FwdInputs, FwdOptions};
use super::variants::MAX_HIDDEN_SIZE;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use crate::tensor::Tensor;

/// Problem size established by validation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FwdDims {
    /// Rows processed: the subset length when subsets are given, else x0's rows
    pub rows: usize,
    /// Columns per row
    pub cols: usize,
}

/// Validate the inputs and options of a fused forward call
pub fn validate<R: Runtime>(inputs: &FwdInputs<'_, R>, options: &FwdOptions) -> Result<FwdDims> {
    let x0 = inputs.x0;
    let device_id = x0.device().id();

    // 1. x0
    if !x0.is_contiguous() {
        return Err(Error::NotContiguous { arg: "x0" });
    }
    if x0.ndim() != 2 {
        return Err(Error::invalid_argument(
            "x0",
            format!("expected a 2-D [rows, hidden] tensor, got shape {:?}", x0.shape()),
        ));
    }
    let cols = x0.shape()[1];
    let rows = match inputs.x0_subset {
        Some(subset) => subset.shape().first().copied().unwrap_or(0),
        None => x0.shape()[0],
    };

    // 2. gamma
    let gamma = inputs.gamma;
    check_device("gamma", gamma, device_id)?;
    if !gamma.is_contiguous() {
        return Err(Error::NotContiguous { arg: "gamma" });
    }
    let hidden_size = gamma.numel();
    if hidden_size != cols {
        return Err(Error::shape_mismatch("gamma", &[cols], gamma.shape()));
    }
    let wtype = gamma.dtype();

    // 3. beta
    if let Some(beta) = inputs.beta {
        check_dtype("beta", beta, wtype)?;
        check_device("beta", beta, device_id)?;
        check_contiguous("beta", beta)?;
        check_shape("beta", beta, gamma.shape())?;
    }

    // 4. residual
    if let Some(residual) = inputs.residual {
        check_device("residual", residual, device_id)?;
        check_contiguous("residual", residual)?;
        check_shape("residual", residual, &[rows, cols])?;
    }

    // 5. rowscale
    if let Some(rowscale) = inputs.rowscale {
        check_device("rowscale", rowscale, device_id)?;
        check_contiguous("rowscale", rowscale)?;
        check_shape("rowscale", rowscale, &[rows])?;
        check_dtype("rowscale", rowscale, x0.dtype())?;
    }

    // 6. colscale
    if let Some(colscale) = inputs.colscale {
        check_device("colscale", colscale, device_id)?;
        check_contiguous("colscale", colscale)?;
        check_shape("colscale", colscale, &[cols])?;
        check_dtype("colscale", colscale, wtype)?;
    }

    // 7. row subsets, all or nothing
    match (inputs.x0_subset, inputs.z_subset) {
        (None, None) => {}
        (Some(x0_subset), Some(z_subset)) => {
            for (arg, subset) in [("x0_subset", x0_subset), ("z_subset", z_subset)] {
                check_device(arg, subset, device_id)?;
                check_contiguous(arg, subset)?;
                check_shape(arg, subset, &[rows])?;
                check_dtype(arg, subset, DType::I32)?;
            }
            if options.z_numrows == 0 {
                return Err(Error::invalid_argument(
                    "z_numrows",
                    "must be positive when row subsets are given",
                ));
            }
            // Subset entries are i32, so rows past i32::MAX are unaddressable.
            if options.z_numrows > i32::MAX as usize {
                return Err(Error::invalid_argument(
                    "z_numrows",
                    "exceeds the largest row an i32 subset can address",
                ));
            }
        }
        (Some(_), None) => {
            return Err(Error::invalid_argument(
                "z_subset",
                "required when x0_subset is given",
            ));
        }
        (None, Some(_)) => {
            return Err(Error::invalid_argument(
                "x0_subset",
                "required when z_subset is given",
            ));
        }
    }

    // 8. hidden size
    if hidden_size == 0 || hidden_size % 8 != 0 || hidden_size > MAX_HIDDEN_SIZE {
        return Err(Error::invalid_argument(
            "hidden_size",
            format!(
                "{hidden_size} must be a positive multiple of 8 no larger than {MAX_HIDDEN_SIZE}"
            ),
        ));
    }

    // 9. epsilon
    if options.epsilon.is_nan() || options.epsilon < 0.0 {
        return Err(Error::invalid_argument(
            "epsilon",
            format!("{} must be >= 0", options.epsilon),
        ));
    }

    // 10. dropout probability
    let p = options.dropout_p;
    if !(0.0..1.0).contains(&p) {
        return Err(Error::invalid_argument(
            "dropout_p",
            format!("{p} must be in [0, 1)"),
        ));
    }

    Ok(FwdDims { rows, cols })
}

fn check_device<R: Runtime>(arg: &'static str, t: &Tensor<R>, expected: usize) -> Result<()> {
    let got = t.device().id();
    if got != expected {
        return Err(Error::DeviceMismatch { arg, expected, got });
    }
    Ok(())
}

fn check_contiguous<R: Runtime>(arg: &'static str, t: &Tensor<R>) -> Result<()> {
    if !t.is_contiguous() {
        return Err(Error::NotContiguous { arg });
    }
    Ok(())
}

fn check_shape<R: Runtime>(arg: &'static str, t: &Tensor<R>, expected: &[usize]) -> Result<()> {
    if t.shape() != expected {
        return Err(Error::shape_mismatch(arg, expected, t.shape()));
    }
    Ok(())
}

fn check_dtype<R: Runtime>(arg: &'static str, t: &Tensor<R>, expected: DType) -> Result<()> {
    if t.dtype() != expected {
        return Err(Error::DTypeMismatch {
            arg,
            expected,
            got: t.dtype(),
        });
    }
    Ok(())
}
