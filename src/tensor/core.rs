//! Core Tensor type

use super::{Layout, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::fmt;

/// N-dimensional array stored on a compute device
///
/// `Tensor` consists of:
/// - **Storage**: Reference-counted device memory
/// - **Layout**: Shape, strides, and offset defining the view into storage
/// - **DType**: Element type (determined at runtime)
///
/// # Example
///
/// ```ignore
/// use dropnorm::prelude::*;
///
/// let device = CpuDevice::new();
/// let x = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device)?;
/// let xt = x.transpose(0, 1)?; // Zero-copy, shares storage with x
/// ```
pub struct Tensor<R: Runtime> {
    storage: Storage<R>,
    layout: Layout,
}

impl<R: Runtime> Tensor<R> {
    /// Create a tensor from storage and layout
    pub fn from_parts(storage: Storage<R>, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Create a tensor from a slice of data
    ///
    /// Returns an error if `data.len()` does not equal the product of the `shape` dimensions,
    /// or if memory allocation fails.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], device: &R::Device) -> Result<Self> {
        if Some(data.len()) != shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d)) {
            return Err(Error::shape_mismatch("data", shape, &[data.len()]));
        }

        let storage = Storage::from_bytes(bytemuck::cast_slice(data), T::DTYPE, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create an uninitialized tensor
    ///
    /// Contents are unspecified until a kernel writes them.
    pub fn empty(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len = numel_of(shape)?;
        let storage = Storage::new(len, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create a tensor filled with zeros
    ///
    /// Zeroes memory explicitly, so this holds on backends whose allocator
    /// returns dirty memory.
    pub fn zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len = numel_of(shape)?;
        if len == 0 {
            return Self::empty(shape, dtype, device);
        }
        let bytes = vec![0u8; byte_size(len, dtype)?];
        let storage = Storage::from_bytes(&bytes, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    // ===== Accessors =====

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Get the number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Get the total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Check if the tensor is contiguous in memory
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Device address of the first element of this view
    #[inline]
    pub fn data_ptr(&self) -> u64 {
        let base = self.storage.ptr();
        if base == 0 {
            return 0;
        }
        base + (self.layout.offset() * self.dtype().size_in_bytes()) as u64
    }

    // ===== View Operations (Zero-Copy) =====

    /// Transpose two dimensions (zero-copy)
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Result<Self> {
        let layout = self.layout.transpose(dim0, dim1).ok_or_else(|| {
            Error::invalid_argument("dim", format!("cannot transpose {dim0} and {dim1}"))
        })?;
        Ok(Self::from_parts(self.storage.clone(), layout))
    }

    /// Reshape to a new shape (zero-copy, requires contiguous)
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let layout = self
            .layout
            .reshape(shape)
            .ok_or_else(|| Error::shape_mismatch("reshape", self.shape(), shape))?;
        Ok(Self::from_parts(self.storage.clone(), layout))
    }

    // ===== Host Transfer =====

    /// Copy the tensor's elements to a host vector
    ///
    /// The tensor must be contiguous and `T` must match the dtype's width.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        if !self.is_contiguous() {
            return Err(Error::NotContiguous { arg: "to_vec" });
        }
        if std::mem::size_of::<T>() != self.dtype().size_in_bytes() {
            return Err(Error::invalid_argument(
                "T",
                format!(
                    "{} bytes per element does not match dtype {}",
                    std::mem::size_of::<T>(),
                    self.dtype()
                ),
            ));
        }

        // Allocate with T's alignment, then view as bytes for the copy.
        let mut result = vec![T::zeroed(); self.numel()];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        R::copy_from_device(self.data_ptr(), bytes, self.device())?;
        Ok(result)
    }
}

/// Element count of `shape`, or `OutOfMemory` if it does not fit in `usize`
fn numel_of(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |n, &d| n.checked_mul(d))
        .ok_or(Error::OutOfMemory { size: usize::MAX })
}

/// Bytes needed for `len` elements of `dtype`
pub(crate) fn byte_size(len: usize, dtype: DType) -> Result<usize> {
    len.checked_mul(dtype.size_in_bytes())
        .ok_or(Error::OutOfMemory { size: usize::MAX })
}

impl<R: Runtime> Clone for Tensor<R> {
    /// Clone shares the underlying storage (zero-copy)
    fn clone(&self) -> Self {
        Self::from_parts(self.storage.clone(), self.layout.clone())
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("device", self.device())
            .field("contiguous", &self.is_contiguous())
            .finish()
    }
}
