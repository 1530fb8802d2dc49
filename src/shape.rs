//! Shapes and broadcast shape resolution.
//!
//! Shapes are right-aligned when ranks differ: the shorter shape is padded with
//! leading size-1 dimensions before the per-axis comparison.

use std::fmt;
use std::ops::Deref;

use smallvec::SmallVec;

use crate::{Result, StridedError};

type DimVec = SmallVec<[usize; 4]>;

/// An ordered list of dimension sizes. The rank is the list length.
///
/// A rank-0 shape describes a single scalar element.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: DimVec,
}

impl Shape {
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    /// The rank-0 shape `()`.
    pub fn scalar() -> Self {
        Self::default()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements, or `None` if the product overflows `usize`.
    ///
    /// Any zero dimension makes the count 0, even if the other dimensions
    /// alone would overflow.
    pub fn checked_len(&self) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Number of elements.
    ///
    /// # Panics
    /// Panics if the product of the dimensions overflows `usize`. Shapes that
    /// back a [`crate::Buffer`] have already been checked.
    #[inline]
    pub fn len(&self) -> usize {
        match self.checked_len() {
            Some(len) => len,
            None => panic!("element count of shape {self} overflows usize"),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.contains(&0)
    }

    /// Row-major strides for this shape.
    pub fn row_major_strides(&self) -> Vec<isize> {
        row_major_strides(&self.dims)
    }
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.dims
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self {
            dims: SmallVec::from_vec(dims),
        }
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(&dims)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.dims.iter()).finish()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        if self.dims.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Compute row-major strides (C default: last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        // saturates only for shapes with a zero dimension, which are never addressed
        strides[i] = strides[i + 1].saturating_mul(dims[i + 1] as isize);
    }
    strides
}

/// Size of `dims` at `axis` once it has been left-padded with 1s to `rank`.
/// Element count of `dims`, 0 as soon as any dimension is 0.
///
/// The nonzero product must fit in `usize`, as it does for any buffer or a view
/// of one.
pub(crate) fn element_count(dims: &[usize]) -> usize {
    if dims.contains(&0) {
        0
    } else {
        dims.iter().product()
    }
}

#[inline]
fn padded_dim(dims: &[usize], rank: usize, axis: usize) -> usize {
    let pad = rank - dims.len();
    if axis < pad {
        1
    } else {
        dims[axis - pad]
    }
}

/// Compute the broadcast shape of two shapes.
///
/// Per axis: equal sizes are kept, a size of 1 stretches to the other size, and
/// anything else is an error. The error names the first incompatible axis of
/// the padded result, scanning from the left.
///
/// # Example
/// ```
/// use strided_broadcast::broadcast_shape;
///
/// assert_eq!(broadcast_shape(&[2, 1], &[1, 3]).unwrap().dims(), &[2, 3]);
/// assert_eq!(broadcast_shape(&[4, 3], &[3]).unwrap().dims(), &[4, 3]);
/// assert!(broadcast_shape(&[2, 2], &[3, 3]).is_err());
/// ```
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Shape> {
    let rank = a.len().max(b.len());
    let mut dims = DimVec::with_capacity(rank);

    for axis in 0..rank {
        let a_dim = padded_dim(a, rank, axis);
        let b_dim = padded_dim(b, rank, axis);

        let dim = if a_dim == b_dim {
            a_dim
        } else if a_dim == 1 {
            b_dim
        } else if b_dim == 1 {
            a_dim
        } else {
            return Err(StridedError::IncompatibleShape {
                lhs: a.to_vec(),
                rhs: b.to_vec(),
                axis,
                reason: format!("sizes {a_dim} and {b_dim} differ and neither is 1"),
            });
        };
        dims.push(dim);
    }

    Ok(Shape { dims })
}

/// Compute the broadcast shape of any number of shapes.
///
/// An empty list resolves to the scalar shape.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Shape> {
    shapes
        .iter()
        .try_fold(Shape::scalar(), |acc, s| broadcast_shape(&acc, s))
}
