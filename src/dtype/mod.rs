//! Data type system for dropnorm tensors
//!
//! This module provides the `DType` enum representing the element types a
//! fused normalization call can see: the three floating point storage
//! precisions the kernels are specialized for, plus the integer types used
//! for row-subset indices, barrier slots, and the dropout mask.

mod element;

pub use element::Element;

use std::fmt;

// ============================================================================
// DType Enum
// ============================================================================

/// Data types supported by dropnorm tensors
///
/// This enum represents the element type of a tensor at runtime. Kernel
/// variant selection happens on these values, so the enum is `Copy`,
/// `Eq`, and `Hash`.
///
/// # Discriminant Values (Serialization Stability)
///
/// - Floats: 0-9 (F32=1, F16=2, BF16=3)
/// - Signed ints: 10-19 (I64=10, I32=11)
/// - Unsigned ints: 20-29 (U8=23)
///
/// Existing values are never changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 32-bit floating point (the wide compute precision)
    F32 = 1,
    /// 16-bit floating point (IEEE 754)
    F16 = 2,
    /// 16-bit brain floating point
    BF16 = 3,

    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer (row-subset indices, barrier slots)
    I32 = 11,

    /// 8-bit unsigned integer (dropout mask, raw workspace bytes)
    U8 = 23,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 => 2,
            Self::U8 => 1,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F16 | Self::BF16)
    }

    /// Returns true if this is a 16-bit floating point type
    #[inline]
    pub const fn is_half(self) -> bool {
        matches!(self, Self::F16 | Self::BF16)
    }

    /// Returns true if this is any integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I64 | Self::I32 | Self::U8)
    }

    /// Short name for display (e.g., "f32", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::U8 => "u8",
        }
    }

    /// Name used in compiled kernel symbols (e.g., "fp16", "bf16", "fp32")
    pub const fn kernel_name(self) -> &'static str {
        match self {
            Self::F32 => "fp32",
            Self::F16 => "fp16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::U8 => "u8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}
