//! CUDA Device implementation
//!
//! Provides CUDA device abstraction using cudarc for direct GPU control.

use crate::error::Result;
use crate::runtime::{Device, DeviceProperties};
use cudarc::driver::sys::CUdevice_attribute;

/// CUDA Device using cudarc
///
/// Represents a single GPU device. Used by CudaClient for stream management.
#[derive(Clone, Debug)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Get the compute capability of this CUDA device
    ///
    /// Returns (major, minor) version numbers (e.g., (8, 0) for sm_80 / A100)
    pub fn compute_capability(&self) -> Result<(u32, u32)> {
        let major = self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?;
        let minor = self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?;
        Ok((major, minor))
    }

    /// Query the hardware limits launch sizing depends on
    pub fn properties(&self) -> Result<DeviceProperties> {
        use CUdevice_attribute::*;
        Ok(DeviceProperties {
            multiprocessor_count: self.attribute(CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?,
            max_threads_per_multiprocessor: self
                .attribute(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_MULTIPROCESSOR)?,
            max_blocks_per_multiprocessor: self
                .attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCKS_PER_MULTIPROCESSOR)?,
            shared_memory_per_multiprocessor: self
                .attribute(CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_MULTIPROCESSOR)?,
            warp_size: self.attribute(CU_DEVICE_ATTRIBUTE_WARP_SIZE)?,
        })
    }

    /// Whether the device supports cooperative (grid-synchronized) launches
    pub fn supports_cooperative_launch(&self) -> Result<bool> {
        Ok(self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COOPERATIVE_LAUNCH)? != 0)
    }

    fn attribute(&self, attribute: CUdevice_attribute) -> Result<u32> {
        let device = cudarc::driver::result::device::get(self.index as i32)?;
        // SAFETY: `device` is a valid handle returned by the driver.
        let value = unsafe { cudarc::driver::result::device::get_attribute(device, attribute)? };
        Ok(value as u32)
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}

impl Default for CudaDevice {
    fn default() -> Self {
        Self::new(0)
    }
}
