//! CUDA kernel loading and caching infrastructure
//!
//! Compiled forward variants ship as PTX modules in the directory named by
//! the `DROPNORM_PTX_DIR` environment variable. Modules are loaded on first
//! use and cached per device.
//!
//! # Thread Safety
//!
//! The module cache uses `OnceLock<Mutex<HashMap>>` for thread-safe
//! initialization and concurrent access from multiple streams.

use cudarc::driver::safe::{CudaContext, CudaFunction, CudaModule};
use cudarc::nvrtc::Ptx;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::{Error, Result};

/// Environment variable naming the directory that holds the PTX modules
pub const PTX_DIR_ENV: &str = "DROPNORM_PTX_DIR";

/// Module holding every fused forward variant
pub const LN_FWD_MODULE: &str = "ln_fwd";

/// Cache for loaded CUDA modules, keyed by (device_index, module_name)
static MODULE_CACHE: OnceLock<Mutex<HashMap<(usize, &'static str), Arc<CudaModule>>>> =
    OnceLock::new();

fn ptx_path(module_name: &str) -> Result<PathBuf> {
    let dir = std::env::var_os(PTX_DIR_ENV).ok_or_else(|| {
        Error::Backend(format!(
            "{PTX_DIR_ENV} is not set; point it at the directory holding {module_name}.ptx"
        ))
    })?;
    Ok(PathBuf::from(dir).join(format!("{module_name}.ptx")))
}

/// Get or load a CUDA module from PTX.
///
/// # Arguments
///
/// * `context` - CUDA context for the target device
/// * `device_index` - Index of the target device (used as cache key)
/// * `module_name` - Name of the PTX file (without extension)
///
/// # Errors
///
/// Returns an error if the PTX file cannot be found or the module cannot be created.
pub fn get_or_load_module(
    context: &Arc<CudaContext>,
    device_index: usize,
    module_name: &'static str,
) -> Result<Arc<CudaModule>> {
    let cache = MODULE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);

    let key = (device_index, module_name);
    if let Some(module) = guard.get(&key) {
        return Ok(module.clone());
    }

    let path = ptx_path(module_name)?;
    if !path.is_file() {
        return Err(Error::Backend(format!(
            "PTX module '{module_name}' not found at {}",
            path.display()
        )));
    }

    let module = context
        .load_module(Ptx::from_file(&path))
        .map_err(|e| Error::Backend(format!("failed to load CUDA module '{module_name}': {e:?}")))?;
    tracing::debug!(device_index, module_name, path = %path.display(), "loaded PTX module");

    guard.insert(key, module.clone());
    Ok(module)
}

/// Get a kernel function from a loaded module.
///
/// # Errors
///
/// Returns an error if the kernel function is not found in the module.
pub fn get_kernel_function(module: &Arc<CudaModule>, kernel_name: &str) -> Result<CudaFunction> {
    module.load_function(kernel_name).map_err(|e| {
        Error::Backend(format!(
            "failed to get kernel '{kernel_name}': {e:?}. \
             The PTX module may predate this variant table."
        ))
    })
}
