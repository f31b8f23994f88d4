//! Reference-counted device allocations

use super::core::byte_size;
use crate::dtype::DType;
use crate::error::Result;
use crate::runtime::Runtime;
use std::fmt;
use std::sync::Arc;

/// One device allocation, freed when the last view of it is dropped
struct Allocation<R: Runtime> {
    /// Device address (a host pointer on the CPU runtime)
    ptr: u64,
    bytes: usize,
    device: R::Device,
}

impl<R: Runtime> Drop for Allocation<R> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            R::deallocate(self.ptr, self.bytes, &self.device);
        }
    }
}

/// Typed handle to a shared device allocation
///
/// Views created by `transpose` or `reshape` clone the handle, never the memory.
pub struct Storage<R: Runtime> {
    alloc: Arc<Allocation<R>>,
    dtype: DType,
}

impl<R: Runtime> Storage<R> {
    /// Allocate room for `len` elements of `dtype`; contents are unspecified
    pub fn new(len: usize, dtype: DType, device: &R::Device) -> Result<Self> {
        let bytes = byte_size(len, dtype)?;
        let ptr = R::allocate(bytes, device)?;
        Ok(Self::adopt(ptr, bytes, dtype, device))
    }

    /// Allocate and upload `data`, interpreted as elements of `dtype`
    pub fn from_bytes(data: &[u8], dtype: DType, device: &R::Device) -> Result<Self> {
        let ptr = R::allocate(data.len(), device)?;
        // Adopt first so a failed upload still frees the allocation.
        let storage = Self::adopt(ptr, data.len(), dtype, device);
        R::copy_to_device(data, ptr, device)?;
        Ok(storage)
    }

    fn adopt(ptr: u64, bytes: usize, dtype: DType, device: &R::Device) -> Self {
        Self {
            alloc: Arc::new(Allocation {
                ptr,
                bytes,
                device: device.clone(),
            }),
            dtype,
        }
    }

    /// Base device address
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.alloc.ptr
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Owning device
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.alloc.device
    }

    /// Allocation size
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.alloc.bytes
    }

    /// Elements of `dtype` that fit in the allocation
    #[inline]
    pub fn len(&self) -> usize {
        self.alloc.bytes / self.dtype.size_in_bytes()
    }

    /// Whether the allocation holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alloc.bytes == 0
    }
}

impl<R: Runtime> Clone for Storage<R> {
    fn clone(&self) -> Self {
        Self {
            alloc: Arc::clone(&self.alloc),
            dtype: self.dtype,
        }
    }
}

impl<R: Runtime> fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage({:#x}, {} bytes of {}, {} views)",
            self.alloc.ptr,
            self.alloc.bytes,
            self.dtype,
            Arc::strong_count(&self.alloc)
        )
    }
}
