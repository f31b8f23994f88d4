//! Error types for dropnorm

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using dropnorm's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating, dispatching, or launching a fused kernel
#[derive(Error, Debug)]
pub enum Error {
    /// No kernel variant is registered for the requested types and padded hidden size
    #[error(
        "Unsupported hidden_size or types: hidden_size={hidden_size}, \
         wtype={wtype:?}, itype={itype:?}, rtype={rtype:?}, otype={otype:?}, ctype={ctype:?}"
    )]
    UnsupportedCombination {
        /// Padded hidden size used for the lookup
        hidden_size: usize,
        /// Weight dtype
        wtype: DType,
        /// Input dtype
        itype: DType,
        /// Residual dtype
        rtype: DType,
        /// Output dtype
        otype: DType,
        /// Compute dtype
        ctype: DType,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// Shape mismatch between an argument and what the operation expects
    #[error("Shape mismatch for '{arg}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// The argument name
        arg: &'static str,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// DType mismatch between an argument and what the operation expects
    #[error("DType mismatch for '{arg}': expected {expected:?}, got {got:?}")]
    DTypeMismatch {
        /// The argument name
        arg: &'static str,
        /// Expected dtype
        expected: DType,
        /// Actual dtype
        got: DType,
    },

    /// Argument lives on a different device than the primary input
    #[error("Device mismatch: '{arg}' is on device {got}, expected device {expected}")]
    DeviceMismatch {
        /// The argument name
        arg: &'static str,
        /// Device id of the primary input
        expected: usize,
        /// Device id of the argument
        got: usize,
    },

    /// Tensor is not contiguous when contiguous memory is required
    #[error("Operation requires contiguous tensor for '{arg}'")]
    NotContiguous {
        /// The argument name
        arg: &'static str,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA driver error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(arg: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            arg,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
