//! Fused dropout + residual add + LayerNorm dispatch
//!
//! A forward call flows through these pieces:
//!
//! ```text
//! validate ──▶ KernelTypes + round_hidden_size ──▶ LaunchKey
//!                                                     │
//!                      KernelRegistry::lookup ◀───────┘
//!                                 │
//!        FwdLauncher::configure (sizing) ──▶ LaunchPlan
//!                                 │
//!           allocate scratch, then reserve Philox counters
//!                                 │
//!        FwdLauncher::launch (executing) ──▶ z, x, dmask, mu, rsigma
//! ```
//!
//! Every runtime registers the same variant table (see [`variants`]), so the
//! set of supported (types, hidden size) combinations does not depend on the
//! backend.

mod forward;
mod key;
mod launcher;
mod params;
mod registry;
mod traits;
mod validate;
mod variants;

pub use forward::{
    FusedNormOps, FwdInputs, FwdOptions, FwdOutputs, dropout_add_ln_fwd, dropout_add_ln_fwd_with,
};
pub use key::{
    HIDDEN_SHIFT, KernelTypes, LaunchKey, TYPE_ID_BF16, TYPE_ID_F16, TYPE_ID_F32, TYPE_TAG_BITS,
    TYPE_TAG_COUNT, TYPE_TAG_SHIFT, round_hidden_size, type_id,
};
pub use launcher::FwdLauncher;
pub use params::{DevicePtr, FwdParams, LaunchParams};
pub use registry::{FusedKernels, KernelRegistry};
pub use traits::{KernelTraits, LaunchPlan};
pub use validate::{FwdDims, validate};
pub use variants::{
    HIDDEN_SIZES, MAX_HIDDEN_SIZE, TYPE_COMBINATIONS, Variant, build_registry, traits_for,
    variants,
};
