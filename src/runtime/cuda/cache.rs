//! Per-device client cache shared by every CUDA runtime call

use super::client::CudaClient;
use super::device::CudaDevice;
use crate::error::Result;
use cudarc::driver::sys::{CUcontext, CUresult, CUstream, cuCtxGetCurrent};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Device index -> client; a client owns a context, a stream and the queried limits
static CLIENTS: OnceLock<Mutex<HashMap<usize, CudaClient>>> = OnceLock::new();

/// Lock the cache; inserts are idempotent, so a poisoned lock is still usable
fn clients() -> MutexGuard<'static, HashMap<usize, CudaClient>> {
    CLIENTS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Whether the calling thread has a live CUDA context
///
/// # Safety
///
/// Calls the driver directly; the answer only describes the calling thread.
#[inline]
pub(super) unsafe fn is_cuda_context_valid() -> bool {
    let mut ctx: CUcontext = std::ptr::null_mut();
    // SAFETY: cuCtxGetCurrent only writes the out-pointer.
    let result = unsafe { cuCtxGetCurrent(&mut ctx) };
    result == CUresult::CUDA_SUCCESS && !ctx.is_null()
}

/// Cached client for `device`, created on first use
pub(super) fn client_for(device: &CudaDevice) -> Result<CudaClient> {
    let mut clients = clients();
    if let Some(client) = clients.get(&device.index) {
        return Ok(client.clone());
    }
    let client = CudaClient::new(device.clone())?;
    clients.insert(device.index, client.clone());
    Ok(client)
}

/// Stream of the cached client for a device, without creating one
#[inline]
pub(super) fn try_get_cached_stream(device_index: usize) -> Option<CUstream> {
    CLIENTS.get()?;
    clients()
        .get(&device_index)
        .map(|client| client.stream().cu_stream())
}

#[cold]
#[inline(never)]
pub(super) fn log_cuda_memory_error(operation: &str, ptr: u64, result: CUresult) {
    tracing::warn!(ptr = format_args!("{ptr:#x}"), ?result, "{operation} failed");
}
