//! Table of compiled forward variants
//!
//! Every runtime registers the same table so that a type/size combination
//! supported on one backend is supported on all of them.

use super::key::{KernelTypes, LaunchKey};
use super::launcher::FwdLauncher;
use super::registry::KernelRegistry;
use super::traits::KernelTraits;
use crate::dtype::DType;
use crate::error::Result;
use crate::runtime::Runtime;
use std::sync::Arc;

/// Padded hidden sizes with compiled variants
pub const HIDDEN_SIZES: [usize; 14] = [
    256, 512, 768, 1024, 1280, 1536, 2048, 2560, 3072, 4096, 5120, 6144, 7168, 8192,
];

/// Largest hidden size any variant handles
pub const MAX_HIDDEN_SIZE: usize = 8192;

/// Supported (weight, input, residual, output) storage types; compute is always f32
pub const TYPE_COMBINATIONS: [KernelTypes; 7] = [
    KernelTypes::new(DType::F32, DType::F32, DType::F32, DType::F32, DType::F32),
    KernelTypes::new(DType::F32, DType::F16, DType::F32, DType::F16, DType::F32),
    KernelTypes::new(DType::F32, DType::F16, DType::F16, DType::F16, DType::F32),
    KernelTypes::new(DType::F32, DType::BF16, DType::F32, DType::BF16, DType::F32),
    KernelTypes::new(DType::F32, DType::BF16, DType::BF16, DType::BF16, DType::F32),
    KernelTypes::new(DType::F16, DType::F16, DType::F16, DType::F16, DType::F32),
    KernelTypes::new(DType::BF16, DType::BF16, DType::BF16, DType::BF16, DType::F32),
];

/// One registered kernel variant
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    /// Storage and compute types
    pub types: KernelTypes,
    /// Grid shape
    pub traits: KernelTraits,
}

impl Variant {
    /// Registry key of this variant
    pub fn key(&self) -> Result<LaunchKey> {
        LaunchKey::new(self.types, self.traits.hidden_size)
    }
}

/// Grid shape for a padded hidden size and input type
///
/// Up to 2560 columns one warp covers a row and a block stacks four rows;
/// wider rows spread over four or eight warps. Four-byte inputs at 7168 and
/// above split each row over two cooperating blocks.
pub fn traits_for(hidden_size: usize, itype: DType) -> KernelTraits {
    let wide_input = itype.size_in_bytes() == 4;
    let (ctas_per_row, warps_m, warps_n) = match hidden_size {
        0..=2560 => (1, 4, 1),
        7168 | 8192 if wide_input => (2, 1, 4),
        6144 | 8192 => (1, 1, 8),
        _ => (1, 1, 4),
    };
    KernelTraits::new(hidden_size, ctas_per_row, warps_m, warps_n, 16)
}

/// Every (types, hidden size) variant, in registration order
pub fn variants() -> impl Iterator<Item = Variant> {
    TYPE_COMBINATIONS.into_iter().flat_map(|types| {
        HIDDEN_SIZES.into_iter().map(move |hidden| Variant {
            types,
            traits: traits_for(hidden, types.itype),
        })
    })
}

/// Build a registry holding one launcher per variant
///
/// `make` turns a variant description into the runtime's launcher.
pub fn build_registry<R, F>(mut make: F) -> KernelRegistry<R>
where
    R: Runtime,
    F: FnMut(Variant) -> Arc<dyn FwdLauncher<R>>,
{
    let mut registry = KernelRegistry::new();
    for variant in variants() {
        match variant.key() {
            Ok(key) => registry.register(key, make(variant)),
            Err(e) => tracing::error!(?variant, "skipping kernel variant: {e}"),
        }
    }
    registry
}
