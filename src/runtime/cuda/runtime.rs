//! CUDA runtime implementation

use super::cache::{client_for, is_cuda_context_valid, log_cuda_memory_error, try_get_cached_stream};
use super::client::CudaClient;
use super::device::CudaDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use cudarc::driver::sys::{self, CUresult};
use std::cell::Cell;

thread_local! {
    static CURRENT_DEVICE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// CUDA Runtime adapter
///
/// Implements the generic Runtime trait for CUDA backend.
/// Uses cudarc for direct GPU control.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;

    fn name() -> &'static str {
        "cuda"
    }

    /// Allocate GPU memory on the device's stream.
    ///
    /// Returns `Err(OutOfMemory)` if CUDA memory allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let client = client_for(device)?;
        let stream = client.stream.cu_stream();
        let mut ptr: u64 = 0;

        // SAFETY: `ptr` is a valid out-pointer and `stream` belongs to a live context.
        let result = unsafe { sys::cuMemAllocAsync(&mut ptr, size_bytes, stream) };
        if result == CUresult::CUDA_SUCCESS {
            return Ok(ptr);
        }

        // Pending frees on the stream may be holding the memory we need.
        client.stream.synchronize()?;
        // SAFETY: as above.
        let result = unsafe { sys::cuMemAllocAsync(&mut ptr, size_bytes, stream) };
        if result == CUresult::CUDA_SUCCESS {
            return Ok(ptr);
        }

        tracing::warn!(size_bytes, ?result, device = device.index, "CUDA allocation failed");
        Err(Error::OutOfMemory { size: size_bytes })
    }

    fn deallocate(ptr: u64, _size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        // SAFETY: the context check and frees only touch driver state; `ptr`
        // came from `allocate`.
        unsafe {
            // Context is gone: the driver reclaimed the memory already
            if !is_cuda_context_valid() {
                return;
            }

            let result = match try_get_cached_stream(device.index) {
                Some(stream) => sys::cuMemFreeAsync(ptr, stream),
                None => sys::cuMemFree_v2(ptr),
            };

            if result != CUresult::CUDA_SUCCESS && result != CUresult::CUDA_ERROR_ILLEGAL_ADDRESS {
                log_cuda_memory_error("cuMemFree", ptr, result);
            }
        }
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        let client = client_for(device)?;

        // SAFETY: caller guarantees `dst` addresses at least `src.len()` bytes.
        let result = unsafe {
            sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            )
        };
        if result != CUresult::CUDA_SUCCESS {
            return Err(Error::Backend(format!(
                "CUDA host-to-device copy failed: {} bytes ({result:?})",
                src.len()
            )));
        }

        // `src` may be dropped as soon as we return
        client.stream.synchronize()?;
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        let client = client_for(device)?;

        // SAFETY: caller guarantees `src` addresses at least `dst.len()` bytes.
        let result = unsafe {
            sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            )
        };
        if result != CUresult::CUDA_SUCCESS {
            return Err(Error::Backend(format!(
                "CUDA device-to-host copy failed: {} bytes ({result:?})",
                dst.len()
            )));
        }

        client.stream.synchronize()?;
        Ok(())
    }

    fn current_device() -> Option<Self::Device> {
        CURRENT_DEVICE.with(|d| d.get()).map(CudaDevice::new)
    }

    fn set_current_device(device: &Self::Device) -> Result<()> {
        client_for(device)?.context.bind_to_thread()?;
        CURRENT_DEVICE.with(|d| d.set(Some(device.index)));
        Ok(())
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        match client_for(device) {
            Ok(client) => client,
            Err(e) => panic!("failed to create CUDA client for device {}: {e}", device.index),
        }
    }
}

/// Get a specific CUDA device by ID
pub fn cuda_device(device_id: usize) -> CudaDevice {
    CudaDevice::new(device_id)
}

/// Check if CUDA is available on this system
pub fn is_cuda_available() -> bool {
    client_for(&CudaDevice::new(0)).is_ok()
}
