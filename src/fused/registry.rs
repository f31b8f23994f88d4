//! Kernel registry: launch key to launcher lookup

use super::key::LaunchKey;
use super::launcher::FwdLauncher;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Table of forward launchers for one runtime
///
/// Lookup is exact: a key for padded hidden size 512 never resolves to a
/// variant compiled for another size or type combination.
pub struct KernelRegistry<R: Runtime> {
    launchers: HashMap<LaunchKey, Arc<dyn FwdLauncher<R>>>,
}

impl<R: Runtime> KernelRegistry<R> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            launchers: HashMap::new(),
        }
    }

    /// Insert a launcher, replacing any previous entry for the same key
    pub fn register(&mut self, key: LaunchKey, launcher: Arc<dyn FwdLauncher<R>>) {
        self.launchers.insert(key, launcher);
    }

    /// Find the launcher registered for `key`
    pub fn lookup(&self, key: LaunchKey) -> Result<Arc<dyn FwdLauncher<R>>> {
        self.launchers.get(&key).cloned().ok_or_else(|| {
            let types = key.types();
            Error::UnsupportedCombination {
                hidden_size: key.hidden_size(),
                wtype: types.wtype,
                itype: types.itype,
                rtype: types.rtype,
                otype: types.otype,
                ctype: types.ctype,
            }
        })
    }

    /// Whether a launcher is registered for `key`
    pub fn contains(&self, key: LaunchKey) -> bool {
        self.launchers.contains_key(&key)
    }

    /// Number of registered variants
    pub fn len(&self) -> usize {
        self.launchers.len()
    }

    /// Whether no variant is registered
    pub fn is_empty(&self) -> bool {
        self.launchers.is_empty()
    }

    /// Registered keys, in ascending order
    pub fn keys(&self) -> Vec<LaunchKey> {
        let mut keys: Vec<_> = self.launchers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl<R: Runtime> Default for KernelRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Runtime> fmt::Debug for KernelRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("runtime", &R::name())
            .field("variants", &self.launchers.len())
            .finish()
    }
}

/// Runtimes that ship fused forward kernels
///
/// The registry is built once on first use and is read-only afterwards.
pub trait FusedKernels: Runtime {
    /// Process-wide forward launcher table for this runtime
    fn fwd_registry() -> &'static KernelRegistry<Self>;
}
