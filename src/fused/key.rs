//! Launch keys: packed (element types, padded hidden size) discriminators
//!
//! ```text
//!  63                               32 31          10 9   8 7   6 5   4 3   2 1   0
//! +-----------------------------------+--------------+-----+-----+-----+-----+-----+
//! |        rounded hidden size        |   (unused)   |  c  |  o  |  r  |  i  |  w  |
//! +-----------------------------------+--------------+-----+-----+-----+-----+-----+
//! ```
//!
//! `w`, `i`, `r`, `o`, `c` are the type tags of the weight, input, residual,
//! output, and compute element types.

use crate::dtype::DType;
use crate::error::{Error, Result};
use std::fmt;

/// Width of one type tag in bits
pub const TYPE_TAG_BITS: u32 = 2;

/// Distance between consecutive type tags
pub const TYPE_TAG_SHIFT: u32 = 2;

/// Number of type tags packed into a key
pub const TYPE_TAG_COUNT: u32 = 5;

/// Position of the hidden size field
pub const HIDDEN_SHIFT: u32 = 32;

/// Tag for half-precision floats
pub const TYPE_ID_F16: u32 = 0;
/// Tag for bfloat16
pub const TYPE_ID_BF16: u32 = 1;
/// Tag for single-precision floats
pub const TYPE_ID_F32: u32 = 2;

const TYPE_TAG_MASK: u64 = (1 << TYPE_TAG_BITS) - 1;

const _: () = {
    assert!(TYPE_TAG_BITS <= TYPE_TAG_SHIFT, "type tags overlap");
    assert!(TYPE_ID_F32 as u64 <= TYPE_TAG_MASK, "type tag exceeds its field");
    assert!(
        TYPE_TAG_SHIFT * (TYPE_TAG_COUNT - 1) + TYPE_TAG_BITS <= HIDDEN_SHIFT,
        "type tags overflow into the hidden size field"
    );
    assert!(HIDDEN_SHIFT + u32::BITS <= u64::BITS, "hidden size overflows the key");
};

/// Map a dtype to its 2-bit type tag
///
/// Only the three floating-point storage types have tags.
pub fn type_id(dtype: DType) -> Result<u32> {
    match dtype {
        DType::F16 => Ok(TYPE_ID_F16),
        DType::BF16 => Ok(TYPE_ID_BF16),
        DType::F32 => Ok(TYPE_ID_F32),
        _ => Err(Error::unsupported_dtype(dtype, "fused layer norm")),
    }
}

fn dtype_from_id(id: u32) -> Option<DType> {
    match id {
        TYPE_ID_F16 => Some(DType::F16),
        TYPE_ID_BF16 => Some(DType::BF16),
        TYPE_ID_F32 => Some(DType::F32),
        _ => None,
    }
}

/// Round a hidden size up to the padded size a kernel variant is compiled for
///
/// The bucket width grows with the size: multiples of 256 up to 1536, of 512
/// up to 3072, and of 1024 beyond.
#[inline]
pub fn round_hidden_size(hidden_size: usize) -> usize {
    let multiple = if hidden_size <= 1536 {
        256
    } else if hidden_size <= 3072 {
        512
    } else {
        1024
    };
    hidden_size.div_ceil(multiple) * multiple
}

/// Element types of one fused launch: weight, input, residual, output, compute
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct KernelTypes {
    /// gamma/beta/colscale
    pub wtype: DType,
    /// x0/rowscale
    pub itype: DType,
    /// residual and the pre-norm sum x
    pub rtype: DType,
    /// z
    pub otype: DType,
    /// accumulation
    pub ctype: DType,
}

impl KernelTypes {
    /// Bundle five element types
    pub const fn new(wtype: DType, itype: DType, rtype: DType, otype: DType, ctype: DType) -> Self {
        Self {
            wtype,
            itype,
            rtype,
            otype,
            ctype,
        }
    }

    fn as_array(&self) -> [DType; TYPE_TAG_COUNT as usize] {
        [self.wtype, self.itype, self.rtype, self.otype, self.ctype]
    }
}

impl fmt::Display for KernelTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.wtype.kernel_name(),
            self.itype.kernel_name(),
            self.rtype.kernel_name(),
            self.otype.kernel_name(),
            self.ctype.kernel_name()
        )
    }
}

/// 64-bit registry key for a kernel variant
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaunchKey(u64);

impl LaunchKey {
    /// Pack five element types and an already-rounded hidden size
    pub fn new(types: KernelTypes, hidden_rounded: usize) -> Result<Self> {
        let hidden = u32::try_from(hidden_rounded).map_err(|_| {
            Error::invalid_argument(
                "hidden_size",
                format!("{hidden_rounded} does not fit the launch key"),
            )
        })?;

        let mut tags = 0u64;
        for (slot, dtype) in types.as_array().into_iter().enumerate() {
            tags |= (type_id(dtype)? as u64) << (slot as u32 * TYPE_TAG_SHIFT);
        }

        Ok(Self(tags | ((hidden as u64) << HIDDEN_SHIFT)))
    }

    /// Raw key value
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Padded hidden size this key selects
    #[inline]
    pub fn hidden_size(self) -> usize {
        (self.0 >> HIDDEN_SHIFT) as usize
    }

    /// Element types this key selects
    pub fn types(self) -> KernelTypes {
        let tag = |slot: u32| {
            let id = (self.0 >> (slot * TYPE_TAG_SHIFT)) & TYPE_TAG_MASK;
            // Keys are only built through `new`, which never stores tag 3.
            dtype_from_id(id as u32).unwrap_or(DType::F32)
        };
        KernelTypes::new(tag(0), tag(1), tag(2), tag(3), tag(4))
    }
}

impl fmt::Debug for LaunchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LaunchKey({:#018x}: {} @ {})", self.0, self.types(), self.hidden_size())
    }
}
