//! Host device handle

use crate::runtime::Device;

/// Host memory domain
///
/// The id only partitions host allocations for bookkeeping: tensors and
/// clients on different ids are treated as living on different devices, and
/// each id has its own default dropout generator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuDevice {
    id: usize,
}

impl CpuDevice {
    /// Device 0, the one every default constructor uses
    pub fn new() -> Self {
        Self { id: 0 }
    }

    /// Host device with an explicit id
    pub fn with_id(id: usize) -> Self {
        Self { id }
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        format!("cpu:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_distinguish_devices() {
        let (a, b) = (CpuDevice::new(), CpuDevice::with_id(1));
        assert!(a.is_same(&CpuDevice::default()));
        assert!(!a.is_same(&b));
        assert_eq!(b.name(), "cpu:1");
    }
}
