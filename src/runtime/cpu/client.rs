//! CPU client implementation

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::runtime::{DeviceProperties, RuntimeClient};

/// CPU client for operation dispatch
///
/// Work issued through a CPU client runs synchronously on the calling
/// thread (fanned out over rayon's pool when enabled).
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    properties: DeviceProperties,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            properties: host_properties(),
        }
    }

    /// Create a client that reports custom device properties
    ///
    /// Useful for exercising launch sizing as it would run on a specific GPU.
    pub fn with_properties(device: CpuDevice, properties: DeviceProperties) -> Self {
        Self { device, properties }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // CPU operations are synchronous, nothing to do
        Ok(())
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.properties
    }
}

/// Describe the host as a device: one "multiprocessor" per hardware thread
fn host_properties() -> DeviceProperties {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);

    DeviceProperties {
        multiprocessor_count: threads,
        max_threads_per_multiprocessor: 2048,
        max_blocks_per_multiprocessor: 32,
        shared_memory_per_multiprocessor: 64 * 1024,
        warp_size: 32,
    }
}
