//! Runtime parameters handed to a fused kernel launcher

use super::key::KernelTypes;
use crate::generator::PhiloxState;
use crate::runtime::{DeviceProperties, Runtime};
use crate::tensor::Tensor;
use std::fmt;
use std::marker::PhantomData;

/// Non-owning device address borrowed from a tensor
///
/// The lifetime ties the address to the tensor it was taken from, so a
/// parameter block can never outlive the buffers it points into. Dropping a
/// `DevicePtr` never frees anything.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DevicePtr<'a> {
    addr: u64,
    _borrow: PhantomData<&'a ()>,
}

impl<'a> DevicePtr<'a> {
    /// The null address, used for absent optional buffers
    pub const fn null() -> Self {
        Self {
            addr: 0,
            _borrow: PhantomData,
        }
    }

    /// Address of the first element of `tensor`
    pub fn of<R: Runtime>(tensor: &'a Tensor<R>) -> Self {
        Self {
            addr: tensor.data_ptr(),
            _borrow: PhantomData,
        }
    }

    /// Address of `tensor` if present, null otherwise
    pub fn of_opt<R: Runtime>(tensor: Option<&'a Tensor<R>>) -> Self {
        tensor.map_or_else(Self::null, Self::of)
    }

    /// Raw address
    #[inline]
    pub fn addr(self) -> u64 {
        self.addr
    }

    /// Whether this is the null address
    #[inline]
    pub fn is_null(self) -> bool {
        self.addr == 0
    }

    /// Host view of the address as a typed pointer
    #[inline]
    pub fn cast<T>(self) -> *const T {
        self.addr as *const T
    }

    /// Host view of the address as a typed mutable pointer
    #[inline]
    pub fn cast_mut<T>(self) -> *mut T {
        self.addr as *mut T
    }
}

impl fmt::Debug for DevicePtr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{:#x}", self.addr)
        }
    }
}

/// Parameters of one fused forward launch
///
/// `rows` counts the rows actually processed (the subset length when row
/// subsets are given). Optional inputs and outputs are null when absent.
#[derive(Clone, Debug)]
pub struct FwdParams<'a> {
    /// Rows processed
    pub rows: usize,
    /// Columns per row (the unpadded hidden size)
    pub cols: usize,
    /// Rows of x0 and dmask
    pub x0_rows: usize,
    /// Rows of z
    pub z_rows: usize,
    /// Element types of the launch
    pub types: KernelTypes,

    /// Input, `[x0_rows, cols]`
    pub x0: DevicePtr<'a>,
    /// Residual, `[rows, cols]`
    pub residual: DevicePtr<'a>,
    /// Scale, `[cols]`
    pub gamma: DevicePtr<'a>,
    /// Shift, `[cols]`
    pub beta: DevicePtr<'a>,
    /// Per-row input scale, `[rows]`
    pub rowscale: DevicePtr<'a>,
    /// Per-column input scale, `[cols]`
    pub colscale: DevicePtr<'a>,
    /// 1-based source row of x0 for each processed row, 0 to skip
    pub x0_subset: DevicePtr<'a>,
    /// 1-based destination row of z for each processed row, 0 to skip
    pub z_subset: DevicePtr<'a>,

    /// Pre-norm sum, `[rows, cols]` in the residual type
    pub x: DevicePtr<'a>,
    /// Dropout keep mask, `[x0_rows, cols]` u8; non-null iff dropout is active
    pub dmask: DevicePtr<'a>,
    /// Per-row mean, f32
    pub mu: DevicePtr<'a>,
    /// Per-row inverse standard deviation, f32
    pub rs: DevicePtr<'a>,
    /// Normalized output
    pub z: DevicePtr<'a>,

    /// Cross-CTA reduction scratch
    pub workspace: DevicePtr<'a>,
    /// Cross-CTA barrier counters, i32
    pub barrier: DevicePtr<'a>,

    /// Variance epsilon
    pub epsilon: f32,
    /// Probability of keeping an element
    pub dropout_keep_p: f32,
    /// Scale applied to kept elements, `1 / keep_p`
    pub dropout_scale: f32,
    /// `1 / cols`
    pub inverse_cols: f32,
    /// Scale applied to every input row when row subsets are given
    pub rowscale_const: f32,
    /// Normalize by root-mean-square (no mean subtraction)
    pub is_rms_norm: bool,
    /// Counter-based RNG state for the dropout mask, when dropout is active
    pub philox: Option<PhiloxState>,
}

impl FwdParams<'_> {
    /// Whether the dropout path is active
    ///
    /// Keyed on the mask buffer, which the caller provides exactly when it
    /// asked for dropout. `dropout_keep_p` alone cannot tell: `1.0 - p` rounds
    /// to 1.0 for tiny `p`.
    #[inline]
    pub fn has_dropout(&self) -> bool {
        !self.dmask.is_null()
    }

    /// Whether row subsets are in use
    #[inline]
    pub fn has_subset(&self) -> bool {
        !self.x0_subset.is_null()
    }
}

/// Everything a launcher needs: the stream context, device limits, and the
/// kernel parameters
pub struct LaunchParams<'a, R: Runtime> {
    /// Client whose stream the kernel is issued on
    pub client: &'a R::Client,
    /// Limits of the client's device
    pub props: DeviceProperties,
    /// Kernel parameters
    pub params: FwdParams<'a>,
}

impl<R: Runtime> fmt::Debug for LaunchParams<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchParams")
            .field("runtime", &R::name())
            .field("props", &self.props)
            .field("params", &self.params)
            .finish()
    }
}
