//! CUDA Client implementation
//!
//! CudaClient owns stream and context for direct cudarc access. There is one
//! client per device; `CudaClient::for_device` and `CudaRuntime::default_client`
//! both hand out clones of it.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The underlying
//! CUDA context and stream are reference-counted via `Arc`.

use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::CudaRuntime;
use super::device::CudaDevice;
use crate::error::Result;
use crate::runtime::{DeviceProperties, RuntimeClient};

/// CUDA Runtime Client
///
/// Owns the CUDA context and the stream every fused launch is issued on.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device (owns GPU context)
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all kernels launch
    pub(crate) stream: Arc<CudaStream>,

    /// Hardware limits queried once at creation
    pub(crate) properties: DeviceProperties,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Client for `device`, shared with every other caller on that device
    ///
    /// Clients come from a per-device cache, so all of them issue work on the
    /// same stream and stay ordered with respect to each other.
    ///
    /// # Errors
    ///
    /// Returns an error if the first client for the device cannot be created
    /// (context or stream creation, or the attribute queries, fail).
    pub fn for_device(device: &CudaDevice) -> Result<Self> {
        super::cache::client_for(device)
    }

    /// Create the cached client for a device
    ///
    /// Initializes the CUDA context, creates a stream, and queries the
    /// device's occupancy limits.
    pub(super) fn new(device: CudaDevice) -> Result<Self> {
        let context = CudaContext::new(device.index)?;
        context.bind_to_thread()?;
        let stream = context.new_stream()?;
        let properties = device.properties()?;

        tracing::debug!(device = device.index, ?properties, "created CUDA client");

        Ok(Self {
            device,
            context,
            stream,
            properties,
        })
    }

    /// Get reference to the CUDA stream.
    ///
    /// All kernel launches MUST use this stream for correct ordering.
    #[inline]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()?;
        Ok(())
    }

    fn device_properties(&self) -> &DeviceProperties {
        &self.properties
    }
}
