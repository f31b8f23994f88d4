//! Runtime backends for fused kernel launches
//!
//! This module defines the `Runtime` trait (the tensor runtime collaborator)
//! and provides implementations for the host CPU and, behind the `cuda`
//! feature, NVIDIA GPUs.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, memory, device selection)
//! ├── Device (identifies a specific GPU/CPU)
//! ├── Client (owns the stream/queue work is issued on, reports properties)
//! └── DeviceGuard (scoped device selection for one call)
//! ```

mod guard;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use guard::DeviceGuard;

use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over the memory and device-selection services the
/// launch orchestrator needs. It uses static dispatch via generics, so a
/// `Tensor<R>` can only ever live on a device of kind `R`.
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate device memory
    ///
    /// Returns a device pointer (u64). Zero-sized requests return 0.
    /// Returns `Err(OutOfMemory)` if allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Device currently selected on the calling thread, if any
    fn current_device() -> Option<Self::Device>;

    /// Select `device` for subsequent work issued from the calling thread
    fn set_current_device(device: &Self::Device) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle operation dispatch
///
/// A client owns the stream (or queue) all of its work is issued on.
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self) -> Result<()>;

    /// Hardware properties of the client's device, used for occupancy sizing
    fn device_properties(&self) -> &DeviceProperties;
}

/// Hardware limits a kernel launcher sizes its grid against
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Number of multiprocessors (SMs on CUDA, worker threads on the host)
    pub multiprocessor_count: u32,
    /// Maximum resident threads per multiprocessor
    pub max_threads_per_multiprocessor: u32,
    /// Maximum resident blocks per multiprocessor
    pub max_blocks_per_multiprocessor: u32,
    /// Shared memory per multiprocessor in bytes
    pub shared_memory_per_multiprocessor: u32,
    /// Threads per warp
    pub warp_size: u32,
}

impl DeviceProperties {
    /// Number of blocks of the given shape that can be resident on one multiprocessor
    ///
    /// Host-side analogue of an occupancy query: the minimum of the thread,
    /// block, and shared-memory limits, and never less than one.
    pub fn max_active_blocks(&self, threads_per_block: u32, smem_bytes: u32) -> u32 {
        let by_threads = self.max_threads_per_multiprocessor / threads_per_block.max(1);
        let by_smem = if smem_bytes == 0 {
            u32::MAX
        } else {
            self.shared_memory_per_multiprocessor / smem_bytes
        };
        by_threads
            .min(by_smem)
            .min(self.max_blocks_per_multiprocessor)
            .max(1)
    }
}
