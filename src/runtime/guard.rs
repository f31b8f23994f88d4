//! Scoped device selection

use super::Runtime;
use crate::error::Result;

/// Selects a device for the calling thread and restores the previous
/// selection when dropped.
#[must_use = "the previous device is restored as soon as the guard is dropped"]
pub struct DeviceGuard<R: Runtime> {
    previous: Option<R::Device>,
}

impl<R: Runtime> DeviceGuard<R> {
    /// Make `device` current until the guard goes out of scope
    pub fn new(device: &R::Device) -> Result<Self> {
        let previous = R::current_device();
        R::set_current_device(device)?;
        Ok(Self { previous })
    }
}

impl<R: Runtime> Drop for DeviceGuard<R> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = R::set_current_device(&previous) {
                tracing::warn!(runtime = R::name(), ?previous, "failed to restore device: {e}");
            }
        }
    }
}

impl<R: Runtime> std::fmt::Debug for DeviceGuard<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("previous", &self.previous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_guard_selects_device_on_fresh_thread() {
        std::thread::spawn(|| {
            assert!(CpuRuntime::current_device().is_none());
            let outer = DeviceGuard::<CpuRuntime>::new(&CpuDevice::new()).unwrap();
            assert_eq!(CpuRuntime::current_device(), Some(CpuDevice::new()));
            {
                let _inner = DeviceGuard::<CpuRuntime>::new(&CpuDevice::with_id(2)).unwrap();
                assert_eq!(CpuRuntime::current_device(), Some(CpuDevice::with_id(2)));
            }
            assert_eq!(CpuRuntime::current_device(), Some(CpuDevice::new()));
            drop(outer);
        })
        .join()
        .unwrap();
    }
}
