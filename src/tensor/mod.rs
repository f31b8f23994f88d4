//! Tensor types
//!
//! This module provides the `Tensor` type, an n-dimensional array stored on
//! a compute device. The fused normalization entry points take and return
//! tensors; kernels only ever see their raw addresses.

mod core;
mod layout;
mod storage;

pub use core::Tensor;
pub use layout::{Layout, Shape, Strides};
pub use storage::Storage;
