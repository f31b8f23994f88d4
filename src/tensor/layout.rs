//! Strided view over a tensor's storage

use smallvec::SmallVec;
use std::fmt;

/// Inline capacity for dimensions; fused-norm operands are rank 1 or 2
const INLINE_DIMS: usize = 4;

/// Extent of each dimension
pub type Shape = SmallVec<[usize; INLINE_DIMS]>;

/// Element (not byte) step between neighbours along each dimension
pub type Strides = SmallVec<[isize; INLINE_DIMS]>;

/// Shape, strides and element offset of a tensor view
///
/// Element `[i0, .., in]` lives at `offset + sum(ik * strides[k])`.
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Dense row-major layout
    ///
    /// ```
    /// use dropnorm::tensor::Layout;
    /// let layout = Layout::contiguous(&[4, 256]);
    /// assert_eq!(layout.strides(), &[256, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        let mut strides: Strides = smallvec::smallvec![0; shape.len()];
        let mut step = 1isize;
        for (stride, &dim) in strides.iter_mut().zip(shape).rev() {
            *stride = step;
            step *= dim as isize;
        }
        Self {
            shape: shape.iter().copied().collect(),
            strides,
            offset: 0,
        }
    }

    /// Extent of each dimension
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Offset of the first element, in elements
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Rank
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements in the view
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the view is dense and row-major
    ///
    /// Unit dimensions may carry any stride.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1isize;
        self.shape
            .iter()
            .zip(&self.strides)
            .rev()
            .all(|(&dim, &stride)| {
                let ok = dim == 1 || stride == expected;
                expected *= dim as isize;
                ok
            })
    }

    fn axis(&self, d: isize) -> Option<usize> {
        let ndim = self.ndim() as isize;
        let d = if d < 0 { d + ndim } else { d };
        (0..ndim).contains(&d).then_some(d as usize)
    }

    /// View with two axes swapped; negative axes count from the end
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Option<Self> {
        let (a, b) = (self.axis(dim0)?, self.axis(dim1)?);
        let mut view = self.clone();
        view.shape.swap(a, b);
        view.strides.swap(a, b);
        Some(view)
    }

    /// Dense view with a new shape, if this view is dense and sizes agree
    pub fn reshape(&self, shape: &[usize]) -> Option<Self> {
        if !self.is_contiguous() || shape.iter().product::<usize>() != self.elem_count() {
            return None;
        }
        Some(Self {
            offset: self.offset,
            ..Self::contiguous(shape)
        })
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}+{}", self.shape.as_slice(), self.strides.as_slice(), self.offset)
    }
}
